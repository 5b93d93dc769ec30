//! # textblock-detect
//!
//! Finds candidate text regions in grayscale document images without any
//! trained model. The detector reports region boxes, per-region confidences and
//! the page skew angle; it does not recognize characters.
//!
//! ## Pipeline
//!
//! 1. **Binarization**: Sobel edge map, split into tiles; tiles with too little
//!    edge energy are skipped, the rest are thresholded into a foreground mask.
//! 2. **Skew**: a projection-profile sweep and refinement on reduced copies of
//!    the mask; pages tilted by at least `skew_min_angle` are rotated level and
//!    re-binarized.
//! 3. **Components**: 8-connected blobs, filtered by aspect, area and density.
//! 4. **Aggregation**: neighbouring blobs of similar size form pairs, and pairs
//!    are merged into line clusters with union-find.
//! 5. **Finalization**: clusters are scored by blob count, aspect, contrast and
//!    edge strength; survivors become regions.
//!
//! Tile-level work runs on rayon workers according to a
//! [`ParallelPolicy`](core::config::ParallelPolicy); the output never depends on
//! it.
//!
//! ## Modules
//!
//! * [`core`] - Parameters, wire format, error handling and runtime setup
//! * [`domain`] - Result types
//! * [`pipeline`] - The [`TextDetector`](pipeline::TextDetector) engine
//! * [`processors`] - The individual stages
//! * [`utils`] - Image loading and logging helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use textblock_detect::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = load_image(Path::new("page.png"))?;
//!
//! let mut detector = TextDetector::with_parameters(DetectorParameters::default());
//! detector.set_source_image(&image);
//! let result = detector.detect()?;
//!
//! println!("skew: {:.2} deg", result.skew_angle);
//! for (region, confidence) in result.regions.iter().zip(&result.confidences) {
//!     println!("{:?} ({confidence:.2})", region.bbox);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### JSON Configuration
//!
//! ```rust
//! use textblock_detect::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let params: DetectorParameters = serde_json::from_str(r#"
//! {
//!   "skew_enabled": false,
//!   "cluster_min_blobs": 3
//! }
//! "#)?;
//! assert_eq!(params.cluster_min_blobs, 3);
//! assert_eq!(params.edge_tile_x, 32);
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod core;
pub mod domain;

pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use textblock_detect::prelude::*;
/// ```
///
/// Included items focus on the most common tasks:
/// - The engine (`TextDetector`) and its parameters (`DetectorParameters`, `ParallelPolicy`)
/// - Results (`TextDetectionResult`, `TextRegion`)
/// - Essential error and result types (`DetectError`, `DetectResult`)
/// - Basic image loading (`load_image`)
///
/// Individual stages live in [`processors`](crate::processors).
pub mod prelude {
    pub use crate::pipeline::TextDetector;

    pub use crate::core::config::{DetectorParameters, ParallelPolicy};

    pub use crate::domain::{TextDetectionResult, TextRegion};

    pub use crate::core::{DetectError, DetectResult};

    pub use crate::utils::{load_image, load_images_batch};
}
