//! Configuration management for the detector.
//!
//! This module provides the parameter record, its wire format, validation
//! traits and the parallel processing policy.

pub mod derive;
pub mod errors;
pub mod parallel;
pub mod parameters;
pub mod parcel;

pub use errors::{ConfigError, ConfigValidator};
pub use parallel::ParallelPolicy;
pub use parameters::{DetectorParameters, ParameterAdjustment};
pub use parcel::{ParcelError, ParcelField, ParcelReader, ParcelWriter};
