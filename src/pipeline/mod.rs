//! The text detection pipeline.
//!
//! [`TextDetector`] is the engine: it holds the parameters, the parallelism
//! policy and the per-run buffers, and drives the stages in order:
//! binarization, skew estimation and correction, component extraction,
//! pair and cluster aggregation, and finalization.

mod detector;
mod stages;
pub mod stats;

pub use detector::{DEBUG_MASK_FILE, DEBUG_WORKING_FILE, TextDetector};
pub use stats::DetectionDiagnostics;
