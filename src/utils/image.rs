//! Utility functions for image loading and conversion.
//!
//! The detector works on 8-bit grayscale images. These helpers load files of
//! any format the `image` crate understands and convert them, and write the
//! debug artifacts produced when `debug` is set.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};

use crate::core::DetectError;
use crate::core::config::ParallelPolicy;

/// Converts a DynamicImage to a GrayImage (8-bit luma).
pub fn dynamic_to_gray(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Loads an image from a file path and converts it to grayscale.
///
/// # Errors
///
/// Returns `DetectError::ImageLoad` if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<GrayImage, DetectError> {
    let img = image::open(path).map_err(DetectError::ImageLoad)?;
    Ok(dynamic_to_gray(&img))
}

/// Loads a batch of images, in parallel when there are more than the default
/// utility threshold.
pub fn load_images_batch<P: AsRef<Path> + Send + Sync>(
    paths: &[P],
) -> Result<Vec<GrayImage>, DetectError> {
    load_images_batch_with_policy(paths, &ParallelPolicy::default())
}

/// Loads a batch of images using the given parallel policy.
///
/// The output order always matches `paths`.
pub fn load_images_batch_with_policy<P: AsRef<Path> + Send + Sync>(
    paths: &[P],
    policy: &ParallelPolicy,
) -> Result<Vec<GrayImage>, DetectError> {
    if policy.enabled && paths.len() > policy.utility_threshold {
        use rayon::prelude::*;
        paths.par_iter().map(|p| load_image(p.as_ref())).collect()
    } else {
        paths.iter().map(|p| load_image(p.as_ref())).collect()
    }
}

/// Writes `img` as `<dir>/<name>` and returns the full path.
pub fn save_debug_image(dir: &Path, name: &str, img: &GrayImage) -> Result<PathBuf, DetectError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    img.save(&path)
        .map_err(|e| DetectError::debug_output(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = GrayImage::from_pixel(8, 4, Luma([255]));
        img.put_pixel(3, 2, Luma([0]));

        let path = save_debug_image(&dir.path().join("nested"), "page.png", &img).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded, img);

        let batch = load_images_batch(&[path.clone(), path]).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_image(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, DetectError::ImageLoad(_)));
    }
}
