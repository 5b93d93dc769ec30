//! Cluster statistics, the finalized-cluster filter and region confidences.

use image::GrayImage;
use image::imageops::crop_imm;
use imageproc::contrast::otsu_level;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clustering::Cluster;
use super::geometry::PixelBox;
use crate::core::config::DetectorParameters;

/// Aggregate measurements of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub blob_count: usize,
    /// Width over height of the cluster box.
    pub aspect: f32,
    /// Fisher discriminant ratio of dark and light pixels inside the box.
    pub fdr: f32,
    /// Strongest edge value of any member.
    pub edge_max: f32,
    /// Summed member edge values over the box area.
    pub edge_avg: f32,
}

/// Minimums a cluster must reach to become a reported region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalFilter {
    pub min_blobs: usize,
    pub min_aspect: f32,
    pub min_fdr: f32,
    pub min_edge: f32,
    pub min_edge_avg: f32,
}

impl From<&DetectorParameters> for FinalFilter {
    fn from(p: &DetectorParameters) -> Self {
        Self {
            min_blobs: p.cluster_min_blobs.max(0) as usize,
            min_aspect: p.cluster_min_aspect,
            min_fdr: p.cluster_min_fdr,
            min_edge: p.cluster_min_edge as f32,
            min_edge_avg: p.cluster_min_edge_avg as f32,
        }
    }
}

/// How far `value` clears `min`, in [0, 1].
fn margin(value: f32, min: f32) -> f32 {
    if value.is_nan() || value <= 0.0 {
        0.0
    } else if min <= 0.0 {
        1.0
    } else {
        (1.0 - min / value).clamp(0.0, 1.0)
    }
}

impl FinalFilter {
    pub fn accepts(&self, stats: &ClusterStats) -> bool {
        stats.blob_count >= self.min_blobs
            && stats.aspect >= self.min_aspect
            && stats.fdr >= self.min_fdr
            && stats.edge_max >= self.min_edge
            && stats.edge_avg >= self.min_edge_avg
    }

    /// Mean margin of the five statistics over their minimums.
    pub fn confidence(&self, stats: &ClusterStats) -> f32 {
        let margins = [
            margin(stats.blob_count as f32, self.min_blobs as f32),
            margin(stats.aspect, self.min_aspect),
            margin(stats.fdr, self.min_fdr),
            margin(stats.edge_max, self.min_edge),
            margin(stats.edge_avg, self.min_edge_avg),
        ];
        (margins.iter().sum::<f32>() / margins.len() as f32).clamp(0.0, 1.0)
    }
}

/// Splits the pixels inside `bbox` at the Otsu level and returns
/// `(mean_dark - mean_light)^2 / (var_dark + var_light + 1)`.
///
/// Returns 0 when the box is empty or all pixels fall on one side.
pub fn fisher_discriminant_ratio(gray: &GrayImage, bbox: PixelBox) -> f32 {
    if bbox.width == 0 || bbox.height == 0 {
        return 0.0;
    }
    let patch = crop_imm(gray, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
    if patch.width() == 0 || patch.height() == 0 {
        return 0.0;
    }
    let level = otsu_level(&patch);

    let mut dark = (0u64, 0f64, 0f64);
    let mut light = (0u64, 0f64, 0f64);
    for p in patch.pixels() {
        let v = f64::from(p[0]);
        let class = if p[0] <= level { &mut dark } else { &mut light };
        class.0 += 1;
        class.1 += v;
        class.2 += v * v;
    }
    if dark.0 == 0 || light.0 == 0 {
        return 0.0;
    }

    let stats = |(n, sum, sq): (u64, f64, f64)| {
        let n = n as f64;
        let mean = sum / n;
        (mean, (sq / n - mean * mean).max(0.0))
    };
    let (mean_dark, var_dark) = stats(dark);
    let (mean_light, var_light) = stats(light);
    ((mean_dark - mean_light).powi(2) / (var_dark + var_light + 1.0)) as f32
}

/// Measures a cluster against the working grayscale image.
pub fn cluster_stats(cluster: &Cluster, gray: &GrayImage) -> ClusterStats {
    let area = cluster.bbox.area().max(1) as f64;
    ClusterStats {
        blob_count: cluster.blob_count(),
        aspect: cluster.bbox.aspect(),
        fdr: fisher_discriminant_ratio(gray, cluster.bbox),
        edge_max: f32::from(cluster.edge_max),
        edge_avg: (cluster.edge_sum as f64 / area) as f32,
    }
}

/// A cluster that passed the final filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedCluster {
    pub cluster: Cluster,
    pub stats: ClusterStats,
    pub confidence: f32,
}

/// Applies the final filter and scores the survivors, preserving input order.
pub fn finalize_clusters(
    clusters: Vec<Cluster>,
    gray: &GrayImage,
    filter: &FinalFilter,
) -> Vec<FinalizedCluster> {
    let total = clusters.len();
    let kept: Vec<FinalizedCluster> = clusters
        .into_iter()
        .filter(|c| c.blob_count() >= filter.min_blobs)
        .filter_map(|cluster| {
            let stats = cluster_stats(&cluster, gray);
            filter.accepts(&stats).then(|| FinalizedCluster {
                confidence: filter.confidence(&stats),
                cluster,
                stats,
            })
        })
        .collect();
    debug!(clusters = total, regions = kept.len(), "finalized clusters");
    kept
}
