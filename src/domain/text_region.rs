//! Text region types for detection results.

use serde::{Deserialize, Serialize};

use crate::pipeline::stats::DetectionDiagnostics;
use crate::processors::{BoundingBox, ClusterStats, PixelBox};

/// A detected text region.
///
/// `bbox` is in the coordinates of the working image, which is the deskewed
/// copy of the source when skew correction ran and the source itself otherwise.
/// `polygon` is the same box mapped onto the source image; without skew
/// correction it is simply the four corners of `bbox`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    /// Axis-aligned region in working-image coordinates.
    pub bbox: PixelBox,
    /// Region corners in source-image coordinates, clockwise from top-left.
    pub polygon: BoundingBox,
    /// Number of components merged into the region.
    pub blob_count: usize,
    /// Statistics the final filter was applied to.
    pub stats: ClusterStats,
    /// Score in [0, 1]; higher means the statistics clear their minimums by more.
    pub confidence: f32,
}

impl TextRegion {
    pub fn width(&self) -> u32 {
        self.bbox.width
    }

    pub fn height(&self) -> u32 {
        self.bbox.height
    }
}

/// The output of one detection run.
///
/// `confidences` is parallel to `regions`. An empty `regions` list is a valid
/// result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetectionResult {
    /// Regions ordered by top edge, then left edge.
    pub regions: Vec<TextRegion>,
    pub confidences: Vec<f32>,
    /// Page skew in degrees, positive counter-clockwise; 0 when no correction ran.
    pub skew_angle: f32,
    pub diagnostics: DetectionDiagnostics,
}

impl TextDetectionResult {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Regions as bare boxes.
    pub fn boxes(&self) -> Vec<PixelBox> {
        self.regions.iter().map(|r| r.bbox).collect()
    }
}
