//! The core module of the detector.
//!
//! This module contains the pieces every stage depends on:
//! - Configuration: parameters, wire format, validation and parallel policy
//! - Error handling
//! - Process-wide runtime initialization
//! - Macros used to declare parameter records and validators

pub mod config;
pub mod errors;
#[macro_use]
pub mod macros;
pub mod runtime;

pub use crate::utils::{dynamic_to_gray, load_image, load_images_batch};
pub use config::{
    ConfigError, ConfigValidator, DetectorParameters, ParallelPolicy,
    ParameterAdjustment, ParcelError,
};
pub use errors::{DetectError, DetectResult, ProcessingStage};
pub use runtime::{RuntimeInfo, initialize, runtime_info};
