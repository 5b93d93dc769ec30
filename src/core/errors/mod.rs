//! Error types for the text detection pipeline.
//!
//! This module provides the error taxonomy used by every stage of the detector,
//! together with helper constructors that attach stage and context information
//! to underlying errors.
//!
//! # Usage
//!
//! ```rust
//! use textblock_detect::core::errors::{DetectError, ProcessingStage};
//!
//! // Wrap a lower-level failure with the stage it happened in
//! let error = DetectError::processing(
//!     ProcessingStage::Binarization,
//!     "tile 3 could not be thresholded",
//!     std::io::Error::new(std::io::ErrorKind::InvalidData, "tile outside image"),
//! );
//! assert!(error.to_string().contains("binarization"));
//!
//! // Buffers that cannot be reserved report their size
//! let exhausted = DetectError::resource_exhausted("binary mask", 1 << 40);
//! assert!(exhausted.to_string().contains("binary mask"));
//! ```

pub mod constructors;
pub mod types;

pub use types::{DetectError, ProcessingStage};

/// Convenient result alias for detection operations.
pub type DetectResult<T> = Result<T, DetectError>;
