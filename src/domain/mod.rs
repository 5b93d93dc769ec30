//! Domain-level structures returned by the detector.

pub mod text_region;

pub use text_region::{TextDetectionResult, TextRegion};
