//! The stage sequence of one detection run.
//!
//! [`StageRunner`] owns the sanitized parameter snapshot and the diagnostics of
//! a single run. It is created by the engine for every `detect()` call and
//! consumed by [`StageRunner::run`].

use std::time::Instant;

use image::GrayImage;
use tracing::debug;

use crate::core::config::{DetectorParameters, ParallelPolicy, ParameterAdjustment};
use crate::core::errors::DetectResult;
use crate::core::errors::constructors::reserve_working_set;
use crate::domain::{TextDetectionResult, TextRegion};
use crate::processors::{
    BinarizeParams, ClusterMerger, EdgeMask, FinalFilter, PairFilter, SingletonFilter, SkewParams,
    TileGrid, binarize, deskew, estimate_skew, extract_blobs, finalize_clusters, find_pairs,
    rotation_center,
};

use super::stats::DetectionDiagnostics;

/// Everything a run produces.
#[derive(Debug)]
pub(crate) struct StageOutput {
    pub result: TextDetectionResult,
    /// The image the regions were measured on.
    pub working: GrayImage,
    /// Foreground mask of the working image.
    pub mask: GrayImage,
}

pub(crate) struct StageRunner<'a> {
    params: &'a DetectorParameters,
    policy: &'a ParallelPolicy,
    diagnostics: DetectionDiagnostics,
}

impl<'a> StageRunner<'a> {
    pub fn new(
        params: &'a DetectorParameters,
        policy: &'a ParallelPolicy,
        adjustments: Vec<ParameterAdjustment>,
    ) -> Self {
        Self {
            params,
            policy,
            diagnostics: DetectionDiagnostics {
                adjustments,
                ..Default::default()
            },
        }
    }

    fn timed<T>(&mut self, stage: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();
        debug!(stage, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "stage finished");
        self.diagnostics.record_timing(stage, elapsed);
        out
    }

    fn binarize(&mut self, gray: &GrayImage) -> DetectResult<EdgeMask> {
        let params = BinarizeParams::from(self.params);
        let grid = TileGrid::new(gray.width(), gray.height(), params.tile_x, params.tile_y);
        let parallel = self.policy.parallel_tiles(grid.len());
        let edge_mask = self.timed("binarize", || binarize(gray, &params, parallel))?;
        self.diagnostics
            .skipped_tiles
            .extend(edge_mask.skipped.iter().cloned());
        Ok(edge_mask)
    }

    /// Runs every stage on `source`.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` if the working buffers of the run cannot be
    /// reserved, `InvalidInput` for a zero-area source. Per-tile failures are
    /// recorded, not returned.
    pub fn run(mut self, source: &GrayImage) -> DetectResult<StageOutput> {
        let params = self.params;
        reserve_working_set(source.width(), source.height())?;
        let mut edge_mask = self.binarize(source)?;

        let mut skew_angle = 0.0f32;
        let mut working = None;
        if params.skew_enabled {
            let skew_params = SkewParams::from(params);
            let estimate = self.timed("skew", || estimate_skew(&edge_mask.mask, &skew_params));
            self.diagnostics.skew = Some(estimate);
            if estimate.needs_correction() {
                skew_angle = estimate.angle;
                let rotated = self.timed("deskew", || deskew(source, estimate.angle));
                edge_mask = self.binarize(&rotated)?;
                working = Some(rotated);
            }
        }
        let working = working.unwrap_or_else(|| source.clone());

        self.diagnostics.tile_count = edge_mask.grid.len();
        self.diagnostics.non_empty_tiles = edge_mask.tiles.len();

        let parallel = self.policy.parallel_tiles(edge_mask.grid.len());
        let components = self.timed("components", || extract_blobs(&edge_mask, parallel));
        self.diagnostics.skipped_tiles.extend(components.skipped);
        let blobs = components.blobs;
        self.diagnostics.blobs_extracted = blobs.len();

        let blobs = SingletonFilter::from(params).apply(blobs);
        self.diagnostics.blobs_kept = blobs.len();

        let pair_filter = PairFilter::from(params);
        let merger = ClusterMerger::from(params);
        let (pair_count, clusters) = self.timed("aggregate", || {
            let pairs = find_pairs(&blobs, &pair_filter);
            (pairs.len(), merger.merge(&blobs, &pairs))
        });
        self.diagnostics.pairs = pair_count;
        self.diagnostics.clusters = clusters.len();

        let filter = FinalFilter::from(params);
        let finalized = self.timed("finalize", || finalize_clusters(clusters, &working, &filter));

        let center = rotation_center(source.width(), source.height());
        let mut regions: Vec<TextRegion> = finalized
            .into_iter()
            .map(|f| TextRegion {
                bbox: f.cluster.bbox,
                polygon: f
                    .cluster
                    .bbox
                    .to_bounding_box()
                    .rotate_ccw_about(center, skew_angle),
                blob_count: f.cluster.blob_count(),
                stats: f.stats,
                confidence: f.confidence,
            })
            .collect();
        regions.sort_by_key(|r| (r.bbox.y, r.bbox.x));
        self.diagnostics.regions = regions.len();

        debug!(
            regions = regions.len(),
            skew_angle,
            total_ms = self.diagnostics.total_time().as_secs_f64() * 1000.0,
            "detection finished"
        );

        let confidences = regions.iter().map(|r| r.confidence).collect();
        Ok(StageOutput {
            result: TextDetectionResult {
                regions,
                confidences,
                skew_angle,
                diagnostics: self.diagnostics,
            },
            working,
            mask: edge_mask.mask,
        })
    }
}
