//! Error types for the text detection pipeline.
//!
//! This module defines the errors that can occur while detecting text regions:
//! missing input, invalid images, exhausted working memory, per-stage processing
//! failures, configuration problems and wire-format decoding errors.

use crate::core::config::ParcelError;
use thiserror::Error;

/// Enum representing the stages of the detection pipeline.
///
/// This enum is used to identify which stage of the pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ProcessingStage {
    /// Edge map computation and tile thresholding.
    Binarization,
    /// Per-tile component statistics.
    ComponentExtraction,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Binarization => write!(f, "binarization"),
            ProcessingStage::ComponentExtraction => write!(f, "component extraction"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Enum representing the errors that can occur in the detection pipeline.
#[derive(Error, Debug)]
pub enum DetectError {
    /// `detect` was called before a source image was set.
    #[error("no source image set; call set_source_image before detect")]
    MissingSourceImage,

    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// A working buffer could not be allocated.
    #[error("could not reserve {bytes} bytes for {what}")]
    ResourceExhausted {
        /// What the buffer was for.
        what: String,
        /// The requested size in bytes.
        bytes: usize,
    },

    /// Parameter wire-format decoding failed.
    #[error("parameter parcel")]
    Parcel(#[from] ParcelError),

    /// Parameter JSON encoding or decoding failed.
    #[error("parameter json")]
    Json(#[from] serde_json::Error),

    /// A dedicated worker pool could not be built.
    #[error("thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl From<crate::core::config::ConfigError> for DetectError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        DetectError::ConfigError {
            message: error.to_string(),
        }
    }
}
