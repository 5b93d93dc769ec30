//! The text detection engine.

use std::path::Path;

use image::GrayImage;
use tracing::{debug, warn};

use crate::core::config::{ConfigValidator, DetectorParameters, ParallelPolicy};
use crate::core::errors::{DetectError, DetectResult};
use crate::domain::{TextDetectionResult, TextRegion};
use crate::utils::save_debug_image;

use super::stages::{StageOutput, StageRunner};

/// File name of the foreground mask written in debug mode.
pub const DEBUG_MASK_FILE: &str = "textdetect_mask.png";
/// File name of the working image written in debug mode.
pub const DEBUG_WORKING_FILE: &str = "textdetect_working.png";

/// Detects text regions in grayscale document images.
///
/// The detector is a single-owner, reusable object: configure it, hand it a
/// source image, call [`detect`](Self::detect), read the result, then
/// [`clear`](Self::clear) and repeat with the next image. Calls on one instance
/// must not overlap.
///
/// # Examples
///
/// ```
/// use image::{GrayImage, Luma};
/// use textblock_detect::prelude::*;
///
/// let mut detector = TextDetector::new();
/// detector.set_source_image(&GrayImage::from_pixel(64, 64, Luma([255])));
/// let result = detector.detect()?;
/// assert!(result.regions.is_empty());
/// assert_eq!(detector.skew_angle(), 0.0);
/// # Ok::<(), DetectError>(())
/// ```
#[derive(Debug, Default)]
pub struct TextDetector {
    params: DetectorParameters,
    policy: ParallelPolicy,
    /// Dedicated worker pool, present when the policy caps the thread count.
    pool: Option<rayon::ThreadPool>,
    source: Option<GrayImage>,
    working: Option<GrayImage>,
    result: Option<TextDetectionResult>,
}

impl TextDetector {
    /// Creates a detector with default parameters that runs on rayon's global pool.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(params: DetectorParameters) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Creates a detector with its own parallelism policy.
    ///
    /// # Errors
    ///
    /// Fails if the policy is invalid or its worker pool cannot be built.
    pub fn with_policy(params: DetectorParameters, policy: ParallelPolicy) -> DetectResult<Self> {
        let mut detector = Self::with_parameters(params);
        detector.set_parallel_policy(policy)?;
        Ok(detector)
    }

    /// Stores a copy of `params` for subsequent runs.
    pub fn set_parameters(&mut self, params: &DetectorParameters) {
        self.params = params.clone();
    }

    pub fn parameters(&self) -> &DetectorParameters {
        &self.params
    }

    /// Replaces the parallelism policy, rebuilding the worker pool if needed.
    pub fn set_parallel_policy(&mut self, policy: ParallelPolicy) -> DetectResult<()> {
        policy.validate()?;
        self.pool = policy.build_thread_pool()?;
        self.policy = policy;
        Ok(())
    }

    pub fn parallel_policy(&self) -> &ParallelPolicy {
        &self.policy
    }

    /// Stores a copy of `image` as the next source and drops any previous result.
    pub fn set_source_image(&mut self, image: &GrayImage) {
        self.source = Some(image.clone());
        self.working = None;
        self.result = None;
    }

    /// Runs the full pipeline on the current source image.
    ///
    /// The parameters are snapshotted and sanitized at the start of the run;
    /// every clamp applied is listed in the result diagnostics.
    ///
    /// # Errors
    ///
    /// * `MissingSourceImage` if no source image was set.
    /// * `InvalidInput` if the source has zero area.
    /// * `ResourceExhausted` if a working buffer cannot be allocated.
    pub fn detect(&mut self) -> DetectResult<&TextDetectionResult> {
        let source = self.source.as_ref().ok_or(DetectError::MissingSourceImage)?;

        let (params, adjustments) = self.params.sanitized();
        for adj in &adjustments {
            if params.debug {
                warn!(field = %adj.field, original = %adj.original, applied = %adj.applied, "parameter clamped");
            } else {
                debug!(field = %adj.field, original = %adj.original, applied = %adj.applied, "parameter clamped");
            }
        }
        if params.debug {
            debug!("{params}");
        }

        let policy = &self.policy;
        let run = || StageRunner::new(&params, policy, adjustments).run(source);
        let output: StageOutput = match &self.pool {
            Some(pool) => pool.install(run)?,
            None => run()?,
        };

        if params.debug {
            write_debug_images(Path::new(&params.out_dir), &output);
        }

        self.working = Some(output.working);
        Ok(&*self.result.insert(output.result))
    }

    /// Drops the source image, working buffers and the last result.
    ///
    /// Parameters and the worker pool are kept.
    pub fn clear(&mut self) {
        self.source = None;
        self.working = None;
        self.result = None;
    }

    pub fn result(&self) -> Option<&TextDetectionResult> {
        self.result.as_ref()
    }

    /// Moves the last result out of the detector and releases the working
    /// image; the source image is kept.
    pub fn take_result(&mut self) -> Option<TextDetectionResult> {
        self.working = None;
        self.result.take()
    }

    /// Regions of the last run; empty when nothing was found or no run happened.
    pub fn text_regions(&self) -> &[TextRegion] {
        self.result.as_ref().map_or(&[], |r| r.regions.as_slice())
    }

    /// Skew angle of the last run in degrees, 0 before any run.
    pub fn skew_angle(&self) -> f32 {
        self.result.as_ref().map_or(0.0, |r| r.skew_angle)
    }

    /// Confidences parallel to [`text_regions`](Self::text_regions).
    pub fn region_confidences(&self) -> Vec<f32> {
        self.result
            .as_ref()
            .map(|r| r.confidences.clone())
            .unwrap_or_default()
    }

    /// The working image of the last run, or the stored source before a run.
    pub fn source_image(&self) -> Option<&GrayImage> {
        self.working.as_ref().or(self.source.as_ref())
    }
}

fn write_debug_images(dir: &Path, output: &StageOutput) {
    for (name, img) in [
        (DEBUG_MASK_FILE, &output.mask),
        (DEBUG_WORKING_FILE, &output.working),
    ] {
        match save_debug_image(dir, name, img) {
            Ok(path) => debug!(path = %path.display(), "wrote debug image"),
            Err(e) => warn!(error = %e, "failed to write debug image"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::geometric_transformations::{Interpolation, warp_with};

    use crate::processors::{Point, rotation_center};

    /// Draws `count` 6x12 black glyphs spaced `gap` pixels apart.
    fn draw_line(img: &mut GrayImage, x0: u32, y0: u32, count: u32, gap: u32) {
        for i in 0..count {
            let x = x0 + i * (6 + gap);
            for dy in 0..12 {
                for dx in 0..6 {
                    img.put_pixel(x + dx, y0 + dy, Luma([0]));
                }
            }
        }
    }

    fn page(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([255]))
    }

    fn one_line() -> GrayImage {
        let mut img = page(240, 120);
        draw_line(&mut img, 40, 40, 12, 3);
        img
    }

    fn detect(img: &GrayImage, params: DetectorParameters) -> TextDetectionResult {
        let mut detector = TextDetector::with_parameters(params);
        detector.set_source_image(img);
        detector.detect().unwrap().clone()
    }

    #[test]
    fn test_detect_without_image_fails() {
        let mut detector = TextDetector::new();
        assert!(matches!(
            detector.detect(),
            Err(DetectError::MissingSourceImage)
        ));
    }

    #[test]
    fn test_zero_area_image_is_invalid() {
        let mut detector = TextDetector::new();
        detector.set_source_image(&GrayImage::new(0, 10));
        assert!(matches!(
            detector.detect(),
            Err(DetectError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_blank_page_is_empty() {
        let result = detect(&page(100, 100), DetectorParameters::default());
        assert!(result.is_empty());
        assert!(result.confidences.is_empty());
        assert_eq!(result.skew_angle, 0.0);
    }

    #[test]
    fn test_accessors_before_run() {
        let mut detector = TextDetector::new();
        assert!(detector.text_regions().is_empty());
        assert!(detector.region_confidences().is_empty());
        assert_eq!(detector.skew_angle(), 0.0);
        assert!(detector.source_image().is_none());

        let img = one_line();
        detector.set_source_image(&img);
        assert_eq!(detector.source_image(), Some(&img));
        assert!(detector.result().is_none());
    }

    #[test]
    fn test_single_line() {
        let mut detector = TextDetector::new();
        detector.set_source_image(&one_line());
        detector.detect().unwrap();

        let regions = detector.text_regions();
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.blob_count, 12);
        assert!(region.bbox.x <= 40 && region.bbox.right() >= 145);
        assert!(region.bbox.y <= 40 && region.bbox.bottom() >= 52);

        let confidences = detector.region_confidences();
        assert_eq!(confidences.len(), 1);
        assert!((0.0..=1.0).contains(&confidences[0]));
        assert_eq!(confidences[0], region.confidence);
    }

    #[test]
    fn test_two_lines_stay_separate() {
        let mut img = page(240, 140);
        draw_line(&mut img, 40, 40, 12, 3);
        draw_line(&mut img, 40, 80, 12, 3);

        let result = detect(&img, DetectorParameters::default());
        assert_eq!(result.len(), 2);
        assert!(result.regions[0].bbox.y < result.regions[1].bbox.y);
        assert!(!result.regions[0].bbox.intersects(&result.regions[1].bbox));
    }

    #[test]
    fn test_elongated_component_is_excluded() {
        let mut img = one_line();
        for y in 90..96 {
            for x in 40..120 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let result = detect(&img, DetectorParameters::default());
        assert_eq!(result.len(), 1);
        assert!(result.regions[0].bbox.bottom() < 89);
        assert_eq!(result.regions[0].blob_count, 12);
    }

    #[test]
    fn test_level_page_keeps_source_as_working_image() {
        let img = one_line();
        let mut detector = TextDetector::new();
        detector.set_source_image(&img);
        detector.detect().unwrap();

        assert_eq!(detector.skew_angle(), 0.0);
        assert_eq!(detector.source_image(), Some(&img));
        let result = detector.result().unwrap();
        let region = &result.regions[0];
        assert_eq!(region.polygon, region.bbox.to_bounding_box());
    }

    #[test]
    fn test_detect_is_repeatable_after_clear() {
        let img = one_line();
        let mut detector = TextDetector::new();
        detector.set_source_image(&img);
        let first = detector.detect().unwrap().clone();

        detector.clear();
        assert!(detector.result().is_none());
        assert!(detector.source_image().is_none());

        detector.set_source_image(&img);
        let second = detector.detect().unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parallelism_does_not_change_result() {
        let mut img = page(240, 140);
        draw_line(&mut img, 40, 40, 12, 3);
        draw_line(&mut img, 40, 80, 12, 3);

        let params = DetectorParameters::default();
        let mut sequential = TextDetector::with_policy(params.clone(), ParallelPolicy::sequential()).unwrap();
        let mut parallel = TextDetector::with_policy(
            params,
            ParallelPolicy::new()
                .with_tile_threshold(0)
                .with_max_threads(Some(3)),
        )
        .unwrap();

        sequential.set_source_image(&img);
        parallel.set_source_image(&img);
        let a = sequential.detect().unwrap().clone();
        let b = parallel.detect().unwrap().clone();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_parameters_are_snapshotted() {
        let mut params = DetectorParameters::default();
        let mut detector = TextDetector::new();
        detector.set_parameters(&params);
        params.cluster_min_blobs = 100;

        assert_eq!(detector.parameters().cluster_min_blobs, 5);
        detector.set_source_image(&one_line());
        assert_eq!(detector.detect().unwrap().len(), 1);
    }

    #[test]
    fn test_out_of_range_parameters_are_clamped() {
        let mut params = DetectorParameters::default();
        params.edge_tile_x = 0;
        params.single_min_area = -10;
        params.skew_sweep_delta = 0.0;

        let result = detect(&one_line(), params);
        assert_eq!(result.len(), 1);
        let fields: Vec<&str> = result
            .diagnostics
            .adjustments
            .iter()
            .map(|a| a.field.as_str())
            .collect();
        assert_eq!(fields, ["edge_tile_x", "skew_sweep_delta", "single_min_area"]);
    }

    #[test]
    fn test_diagnostics_counts() {
        let result = detect(
            &one_line(),
            DetectorParameters::default().with_skew_enabled(false),
        );
        let diag = &result.diagnostics;
        assert!(diag.skew.is_none());
        assert!(diag.skipped_tiles.is_empty());
        assert_eq!(diag.blobs_kept, 12);
        assert!(diag.pairs >= 11);
        assert_eq!(diag.regions, 1);
        assert!(diag.non_empty_tiles > 0 && diag.non_empty_tiles <= diag.tile_count);
    }

    #[test]
    fn test_rotated_line_is_deskewed() {
        let (width, height) = (320, 192);
        let mut level = page(width, height);
        draw_line(&mut level, 68, 90, 17, 5);

        let center = rotation_center(width, height);
        let rotated = warp_with(
            &level,
            move |x, y| {
                let p = Point::new(x + 0.5, y + 0.5).rotate_ccw_about(center, -10.0);
                (p.x - 0.5, p.y - 0.5)
            },
            Interpolation::Nearest,
            Luma([255]),
        );

        let params = DetectorParameters::default();
        let mut detector = TextDetector::with_parameters(params.clone());
        detector.set_source_image(&rotated);
        detector.detect().unwrap();

        let angle = detector.skew_angle();
        assert!(
            (angle - 10.0).abs() <= params.skew_search_min_delta,
            "angle {angle}"
        );
        assert_eq!(detector.text_regions().len(), 1);
        assert_ne!(detector.source_image(), Some(&rotated));

        // Mapped back onto the source, the top edge rises to the right.
        let polygon = &detector.text_regions()[0].polygon;
        assert!(polygon.points[1].y < polygon.points[0].y);
    }

    #[test]
    fn test_debug_mode_writes_images() {
        let dir = tempfile::tempdir().unwrap();
        let params = DetectorParameters::default().with_debug(true, dir.path().to_string_lossy());
        detect(&one_line(), params);

        assert!(dir.path().join(DEBUG_MASK_FILE).exists());
        assert!(dir.path().join(DEBUG_WORKING_FILE).exists());
    }

    #[test]
    fn test_take_result_leaves_detector_empty() {
        let mut detector = TextDetector::new();
        detector.set_source_image(&one_line());
        detector.detect().unwrap();
        assert!(detector.working.is_some());
        let taken = detector.take_result().unwrap();
        assert_eq!(taken.len(), 1);
        assert!(detector.text_regions().is_empty());
        assert!(detector.working.is_none());
        assert_eq!(detector.source_image(), Some(&one_line()));
    }
}
