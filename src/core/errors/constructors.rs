//! Error constructor utilities for the detection pipeline.
//!
//! These helpers attach a [`ProcessingStage`] and a context string to an
//! underlying error, so call sites stay short:
//!
//! ```rust
//! use textblock_detect::core::{DetectError, ProcessingStage};
//!
//! let error = DetectError::tile_failure(
//!     ProcessingStage::Binarization,
//!     7,
//!     std::io::Error::new(std::io::ErrorKind::Other, "tile outside image"),
//! );
//! assert_eq!(error.to_string(), "binarization failed: tile 7");
//! ```

use super::types::{DetectError, ProcessingStage};

impl DetectError {
    /// Creates a processing error for the given stage.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an error for a single tile of a tiled stage.
    pub fn tile_failure(
        stage: ProcessingStage,
        tile_index: usize,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing(stage, format!("tile {tile_index}"), error)
    }

    /// Creates an error for a failed debug artifact write.
    pub fn debug_output(path: &std::path::Path, error: image::ImageError) -> Self {
        Self::processing(
            ProcessingStage::Generic,
            format!("writing debug image {}", path.display()),
            error,
        )
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a resource error for a buffer of `bytes` bytes.
    pub fn resource_exhausted(what: impl Into<String>, bytes: usize) -> Self {
        Self::ResourceExhausted {
            what: what.into(),
            bytes,
        }
    }
}

/// Bytes per pixel held at once by a detection run: the Sobel gradients (2),
/// the scaled edge map (1), the mask (1), the component labels (4) and the
/// working copy of the source (1).
const WORKING_SET_BYTES_PER_PIXEL: usize = 9;

/// Checks up front that the buffers of a run over a `width` x `height` image
/// can be reserved, then releases the reservation.
///
/// # Errors
///
/// `ResourceExhausted` if the size overflows or the reservation fails.
pub fn reserve_working_set(width: u32, height: u32) -> Result<(), DetectError> {
    let bytes = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(WORKING_SET_BYTES_PER_PIXEL));
    let Some(bytes) = bytes else {
        return Err(DetectError::resource_exhausted("working set", usize::MAX));
    };
    let mut reservation: Vec<u8> = Vec::new();
    reservation
        .try_reserve_exact(bytes)
        .map_err(|_| DetectError::resource_exhausted("working set", bytes))
}

/// Reserves a zeroed byte buffer, mapping allocation failure to
/// [`DetectError::ResourceExhausted`].
pub fn try_zeroed_buffer(what: &str, len: usize) -> Result<Vec<u8>, DetectError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| DetectError::resource_exhausted(what, len))?;
    buffer.resize(len, 0);
    Ok(buffer)
}
