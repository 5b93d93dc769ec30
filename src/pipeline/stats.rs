//! Per-run diagnostics.
//!
//! `DetectionDiagnostics` records what each stage did during one run: the
//! parameter clamps applied, tiles skipped after an error, component counts at
//! every filter and how long each stage took.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::config::ParameterAdjustment;
use crate::processors::{SkewEstimate, TileDiagnostic};

/// Counters and timings of a detection run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionDiagnostics {
    /// Parameters that were clamped before the run.
    pub adjustments: Vec<ParameterAdjustment>,
    /// Tiles dropped because processing them failed.
    pub skipped_tiles: Vec<TileDiagnostic>,
    /// Total tiles in the grid.
    pub tile_count: usize,
    /// Tiles that passed the content test.
    pub non_empty_tiles: usize,
    /// Skew search details when skew estimation ran.
    pub skew: Option<SkewEstimate>,
    pub blobs_extracted: usize,
    pub blobs_kept: usize,
    pub pairs: usize,
    pub clusters: usize,
    pub regions: usize,
    /// Stage name and wall time, in execution order.
    #[serde(skip)]
    pub timings: Vec<(&'static str, Duration)>,
}

impl DetectionDiagnostics {
    pub fn record_timing(&mut self, stage: &'static str, elapsed: Duration) {
        self.timings.push((stage, elapsed));
    }

    pub fn total_time(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }
}

// Timings differ between otherwise identical runs and are left out.
impl PartialEq for DetectionDiagnostics {
    fn eq(&self, other: &Self) -> bool {
        self.adjustments == other.adjustments
            && self.skipped_tiles == other.skipped_tiles
            && self.tile_count == other.tile_count
            && self.non_empty_tiles == other.non_empty_tiles
            && self.skew == other.skew
            && self.blobs_extracted == other.blobs_extracted
            && self.blobs_kept == other.blobs_kept
            && self.pairs == other.pairs
            && self.clusters == other.clusters
            && self.regions == other.regions
    }
}

impl fmt::Display for DetectionDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Detection Diagnostics:")?;
        writeln!(
            f,
            "  Tiles: {} ({} with content, {} skipped)",
            self.tile_count,
            self.non_empty_tiles,
            self.skipped_tiles.len()
        )?;
        if let Some(skew) = &self.skew {
            writeln!(
                f,
                "  Skew: {:.2} deg (raw {:.3}, {} evaluations)",
                skew.angle, skew.raw_angle, skew.evaluations
            )?;
        }
        writeln!(
            f,
            "  Blobs: {} extracted, {} kept",
            self.blobs_extracted, self.blobs_kept
        )?;
        writeln!(
            f,
            "  Pairs: {}, clusters: {}, regions: {}",
            self.pairs, self.clusters, self.regions
        )?;
        for (stage, elapsed) in &self.timings {
            writeln!(f, "  {stage}: {:.2} ms", elapsed.as_secs_f64() * 1000.0)?;
        }
        for adj in &self.adjustments {
            writeln!(f, "  Clamped {}: {} -> {}", adj.field, adj.original, adj.applied)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_timings() {
        let mut a = DetectionDiagnostics {
            blobs_extracted: 12,
            regions: 1,
            ..Default::default()
        };
        let b = a.clone();
        a.record_timing("binarize", Duration::from_millis(3));
        assert_eq!(a, b);
        assert_eq!(a.total_time(), Duration::from_millis(3));
    }

    #[test]
    fn test_display_lists_counts() {
        let diag = DetectionDiagnostics {
            tile_count: 4,
            non_empty_tiles: 2,
            blobs_extracted: 30,
            blobs_kept: 20,
            pairs: 19,
            clusters: 2,
            regions: 1,
            ..Default::default()
        };
        let text = diag.to_string();
        assert!(text.contains("Tiles: 4 (2 with content, 0 skipped)"));
        assert!(text.contains("Blobs: 30 extracted, 20 kept"));
        assert!(text.contains("Pairs: 19, clusters: 2, regions: 1"));
        assert!(!text.contains("Skew"));
    }
}
