//! Detector parameters, their defaults and run-time sanitization.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ParcelError, ParcelReader, ParcelWriter};
use crate::core::errors::DetectResult;
use crate::{define_parameters, impl_config_validator};

fn default_out_dir() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}

define_parameters! {
    /// Every knob of the detection pipeline, grouped by stage.
    ///
    /// The field order is the wire order; see [`write_to_parcel`](Self::write_to_parcel).
    /// Values are never rejected. Each run works on a [`sanitized`](Self::sanitized)
    /// copy instead.
    pub struct DetectorParameters {
        /// Log the parameter dump and write intermediate images to `out_dir`.
        debug: bool = false,
        /// Directory for debug images.
        out_dir: String = default_out_dir(),

        // Edge-based thresholding
        /// Tile width in pixels; <= 0 disables horizontal tiling.
        edge_tile_x: i32 = 32,
        /// Tile height in pixels; <= 0 disables vertical tiling.
        edge_tile_y: i32 = 64,
        /// Edge strength at or above which a pixel is foreground.
        edge_thresh: i32 = 64,
        /// Tiles whose mean edge strength is below this are treated as empty.
        edge_avg_thresh: i32 = 4,

        // Skew angle correction
        skew_enabled: bool = true,
        /// Estimated angles with a smaller magnitude (degrees) are reported as 0.
        skew_min_angle: f32 = 1.0,
        skew_sweep_range: f32 = 30.0,
        skew_sweep_delta: f32 = 5.0,
        skew_sweep_reduction: i32 = 8,
        skew_search_reduction: i32 = 4,
        skew_search_min_delta: f32 = 0.01,

        // Singleton filter
        single_min_aspect: f32 = 0.1,
        single_max_aspect: f32 = 4.0,
        single_min_area: i32 = 4,
        single_min_density: f32 = 0.2,

        // Quick pair filter
        pair_h_ratio: f32 = 1.0,
        pair_d_ratio: f32 = 1.5,
        pair_h_dist_ratio: f32 = 2.0,
        pair_v_dist_ratio: f32 = 0.25,
        pair_h_shared: f32 = 0.25,

        // Cluster pair filter
        cluster_width_spacing: i32 = 2,
        cluster_shared_edge: f32 = 0.5,
        cluster_h_ratio: f32 = 1.0,
        cluster_min_height: i32 = 5,

        // Finalized cluster filter
        cluster_min_blobs: i32 = 5,
        cluster_min_aspect: f32 = 2.0,
        cluster_min_fdr: f32 = 2.5,
        cluster_min_edge: i32 = 32,
        cluster_min_edge_avg: i32 = 1,
    }
}

impl_config_validator!(DetectorParameters {
    edge_tile_x: min(1),
    edge_tile_y: min(1),
    edge_thresh: range(0, 255),
    edge_avg_thresh: min(0),
    skew_min_angle: min(0.0),
    skew_sweep_range: range(0.0, 45.0),
    skew_sweep_delta: positive,
    skew_sweep_reduction: min(1),
    skew_search_reduction: min(1),
    skew_search_min_delta: positive,
    single_min_aspect: min(0.0),
    single_max_aspect: min(0.0),
    single_min_area: min(0),
    single_min_density: range(0.0, 1.0),
    pair_h_ratio: min(0.0),
    pair_d_ratio: min(0.0),
    pair_h_dist_ratio: min(0.0),
    pair_v_dist_ratio: min(0.0),
    pair_h_shared: min(0.0),
    cluster_width_spacing: min(0),
    cluster_shared_edge: min(0.0),
    cluster_h_ratio: min(0.0),
    cluster_min_height: min(0),
    cluster_min_blobs: min(0),
    cluster_min_aspect: min(0.0),
    cluster_min_fdr: min(0.0),
    cluster_min_edge: min(0),
    cluster_min_edge_avg: min(0),
});

/// Smallest sweep step the skew search will use, in degrees.
pub const MIN_SWEEP_DELTA: f32 = 0.1;
/// Largest sweep range the skew search will use, in degrees.
pub const MAX_SWEEP_RANGE: f32 = 45.0;
/// Smallest refinement step the skew search will use, in degrees.
pub const MIN_SEARCH_DELTA: f32 = 0.001;

/// One clamp applied to a parameter before a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAdjustment {
    pub field: String,
    pub original: String,
    pub applied: String,
}

#[derive(Default)]
struct Sanitizer {
    adjustments: Vec<ParameterAdjustment>,
}

impl Sanitizer {
    fn record(&mut self, field: &str, original: impl ToString, applied: impl ToString) {
        self.adjustments.push(ParameterAdjustment {
            field: field.to_string(),
            original: original.to_string(),
            applied: applied.to_string(),
        });
    }

    fn int_at_least(&mut self, field: &str, value: &mut i32, min: i32) {
        if *value < min {
            self.record(field, *value, min);
            *value = min;
        }
    }

    fn float_at_least(&mut self, field: &str, value: &mut f32, min: f32) {
        if value.is_nan() || *value < min {
            self.record(field, *value, min);
            *value = min;
        }
    }
}

impl DetectorParameters {
    /// Creates parameters with the stock defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with every out-of-range value clamped to a safe value,
    /// together with the list of changes made.
    ///
    /// Tile sizes <= 0 are kept as-is; the tiler treats them as one full-image tile.
    pub fn sanitized(&self) -> (Self, Vec<ParameterAdjustment>) {
        let mut p = self.clone();
        let mut s = Sanitizer::default();

        if p.edge_tile_x <= 0 {
            s.record("edge_tile_x", p.edge_tile_x, "full width");
        }
        if p.edge_tile_y <= 0 {
            s.record("edge_tile_y", p.edge_tile_y, "full height");
        }
        s.int_at_least("edge_thresh", &mut p.edge_thresh, 0);
        if p.edge_thresh > 255 {
            s.record("edge_thresh", p.edge_thresh, 255);
            p.edge_thresh = 255;
        }
        s.int_at_least("edge_avg_thresh", &mut p.edge_avg_thresh, 0);

        s.float_at_least("skew_min_angle", &mut p.skew_min_angle, 0.0);
        s.float_at_least("skew_sweep_range", &mut p.skew_sweep_range, 0.0);
        if p.skew_sweep_range > MAX_SWEEP_RANGE {
            s.record("skew_sweep_range", p.skew_sweep_range, MAX_SWEEP_RANGE);
            p.skew_sweep_range = MAX_SWEEP_RANGE;
        }
        s.float_at_least("skew_sweep_delta", &mut p.skew_sweep_delta, MIN_SWEEP_DELTA);
        s.int_at_least("skew_sweep_reduction", &mut p.skew_sweep_reduction, 1);
        s.int_at_least("skew_search_reduction", &mut p.skew_search_reduction, 1);
        s.float_at_least(
            "skew_search_min_delta",
            &mut p.skew_search_min_delta,
            MIN_SEARCH_DELTA,
        );

        s.float_at_least("single_min_aspect", &mut p.single_min_aspect, 0.0);
        s.float_at_least("single_max_aspect", &mut p.single_max_aspect, 0.0);
        s.int_at_least("single_min_area", &mut p.single_min_area, 0);
        s.float_at_least("single_min_density", &mut p.single_min_density, 0.0);

        s.float_at_least("pair_h_ratio", &mut p.pair_h_ratio, 0.0);
        s.float_at_least("pair_d_ratio", &mut p.pair_d_ratio, 0.0);
        s.float_at_least("pair_h_dist_ratio", &mut p.pair_h_dist_ratio, 0.0);
        s.float_at_least("pair_v_dist_ratio", &mut p.pair_v_dist_ratio, 0.0);
        s.float_at_least("pair_h_shared", &mut p.pair_h_shared, 0.0);

        s.int_at_least("cluster_width_spacing", &mut p.cluster_width_spacing, 0);
        s.float_at_least("cluster_shared_edge", &mut p.cluster_shared_edge, 0.0);
        s.float_at_least("cluster_h_ratio", &mut p.cluster_h_ratio, 0.0);
        s.int_at_least("cluster_min_height", &mut p.cluster_min_height, 0);
        s.int_at_least("cluster_min_blobs", &mut p.cluster_min_blobs, 0);
        s.float_at_least("cluster_min_aspect", &mut p.cluster_min_aspect, 0.0);
        s.float_at_least("cluster_min_fdr", &mut p.cluster_min_fdr, 0.0);
        s.int_at_least("cluster_min_edge", &mut p.cluster_min_edge, 0);
        s.int_at_least("cluster_min_edge_avg", &mut p.cluster_min_edge_avg, 0);

        (p, s.adjustments)
    }

    /// Encodes the parameters in wire order.
    pub fn to_parcel_bytes(&self) -> Vec<u8> {
        let mut parcel = ParcelWriter::new();
        self.write_to_parcel(&mut parcel);
        parcel.into_bytes()
    }

    /// Decodes parameters from wire bytes. Bytes after the last field are ignored.
    pub fn from_parcel_bytes(bytes: &[u8]) -> Result<Self, ParcelError> {
        Self::read_from_parcel(&mut ParcelReader::new(bytes))
    }

    /// Loads parameters from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> DetectResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json_string(&self) -> DetectResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builder-style toggle for skew correction.
    pub fn with_skew_enabled(mut self, enabled: bool) -> Self {
        self.skew_enabled = enabled;
        self
    }

    /// Builder-style toggle for debug output.
    pub fn with_debug(mut self, debug: bool, out_dir: impl Into<String>) -> Self {
        self.debug = debug;
        self.out_dir = out_dir.into();
        self
    }
}
