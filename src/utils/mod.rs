//! Utility functions for the detector.
//!
//! This module provides image loading and conversion helpers and logging setup.

pub mod image;

pub use image::{
    dynamic_to_gray, load_image, load_images_batch,
    load_images_batch_with_policy, save_debug_image,
};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
