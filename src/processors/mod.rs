//! Image processing stages of the text detector.
//!
//! Each stage is a free function or a small parameter struct built from
//! [`DetectorParameters`](crate::core::config::DetectorParameters), so stages
//! can be run and tested in isolation.
//!
//! # Modules
//!
//! * `binarize` - Tiled Sobel edge binarization
//! * `skew` - Projection-profile skew estimation and correction
//! * `components` - Connected components and the singleton filter
//! * `clustering` - Pair filter and union-find cluster merge
//! * `finalize` - Final cluster filter and confidence scores
//! * `geometry` - Points and boxes shared by the stages

pub mod binarize;
pub mod clustering;
pub mod components;
pub mod finalize;
mod geometry;
pub mod skew;

pub use binarize::{
    BinarizeParams, EdgeMask, FOREGROUND, TileDiagnostic, TileError, TileGrid, TileRegion, binarize,
    edge_map,
};
pub use clustering::{Cluster, ClusterMerger, Pair, PairFilter, find_pairs};
pub use components::{Blob, Components, SingletonFilter, extract_blobs};
pub use finalize::{ClusterStats, FinalFilter, FinalizedCluster, cluster_stats, finalize_clusters};
pub use geometry::*;
pub use skew::{SkewEstimate, SkewParams, deskew, estimate_skew, rotation_center};
