//! Connected component extraction and the singleton filter.

use std::collections::BTreeMap;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::binarize::{EdgeMask, TileDiagnostic, TileError, TileRegion};
use super::geometry::PixelBox;
use crate::core::config::DetectorParameters;
use crate::core::errors::ProcessingStage;

/// Component labels, 0 for background.
pub(crate) type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// A connected foreground component of the binary mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    pub bbox: PixelBox,
    /// Foreground pixel count.
    pub area: u32,
    /// Lowest index of the tiles the component touches.
    pub tile: usize,
    /// Strongest edge value under the component.
    pub edge_max: u8,
    /// Sum of edge values under the component.
    pub edge_sum: u64,
}

impl Blob {
    /// Pixel area over bounding-box area.
    pub fn density(&self) -> f32 {
        let box_area = self.bbox.area();
        if box_area == 0 {
            0.0
        } else {
            (f64::from(self.area) / box_area as f64) as f32
        }
    }

    pub fn aspect(&self) -> f32 {
        self.bbox.aspect()
    }
}

/// Output of [`extract_blobs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    /// Blobs ordered by top edge, then left edge.
    pub blobs: Vec<Blob>,
    /// Tiles whose statistics could not be gathered.
    pub skipped: Vec<TileDiagnostic>,
}

#[derive(Debug, Clone)]
pub(crate) struct BlobAccumulator {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u32,
    edge_max: u8,
    edge_sum: u64,
    tile: usize,
}

impl BlobAccumulator {
    fn new(x: u32, y: u32, edge: u8, tile: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            area: 0,
            edge_max: edge,
            edge_sum: 0,
            tile,
        }
    }

    fn add(&mut self, x: u32, y: u32, edge: u8) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.area += 1;
        self.edge_max = self.edge_max.max(edge);
        self.edge_sum += u64::from(edge);
    }

    fn merge(&mut self, other: &BlobAccumulator) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
        self.area += other.area;
        self.edge_max = self.edge_max.max(other.edge_max);
        self.edge_sum += other.edge_sum;
        self.tile = self.tile.min(other.tile);
    }

    fn into_blob(self) -> Blob {
        Blob {
            bbox: PixelBox::from_inclusive(self.min_x, self.min_y, self.max_x, self.max_y),
            area: self.area,
            tile: self.tile,
            edge_max: self.edge_max,
            edge_sum: self.edge_sum,
        }
    }
}

pub(crate) fn accumulate_tile(
    labels: &LabelImage,
    edges: &GrayImage,
    tile: &TileRegion,
) -> Result<BTreeMap<u32, BlobAccumulator>, TileError> {
    let b = tile.bounds;
    TileError::check_bounds(b, labels.width(), labels.height())?;
    TileError::check_bounds(b, edges.width(), edges.height())?;

    let mut stats: BTreeMap<u32, BlobAccumulator> = BTreeMap::new();
    for y in b.y..b.bottom() {
        for x in b.x..b.right() {
            let label = labels.get_pixel(x, y)[0];
            if label == 0 {
                continue;
            }
            let edge = edges.get_pixel(x, y)[0];
            stats
                .entry(label)
                .or_insert_with(|| BlobAccumulator::new(x, y, edge, tile.index))
                .add(x, y, edge);
        }
    }
    Ok(stats)
}

/// Labels the mask (8-connected) and returns one [`Blob`] per component,
/// ordered by top edge, then left edge.
///
/// Statistics are gathered per non-empty tile, possibly in parallel, and merged
/// in tile order. A tile that fails contributes nothing and is reported in
/// [`Components::skipped`].
pub fn extract_blobs(edge_mask: &EdgeMask, parallel: bool) -> Components {
    extract_blobs_with(edge_mask, parallel, accumulate_tile)
}

/// [`extract_blobs`] with `tile_fn` gathering the statistics of each tile.
pub(crate) fn extract_blobs_with<F>(
    edge_mask: &EdgeMask,
    parallel: bool,
    tile_fn: F,
) -> Components
where
    F: Fn(&LabelImage, &GrayImage, &TileRegion) -> Result<BTreeMap<u32, BlobAccumulator>, TileError>
        + Sync,
{
    let labels = connected_components(&edge_mask.mask, Connectivity::Eight, Luma([0u8]));

    let per_tile: Vec<_> = if parallel {
        edge_mask
            .tiles
            .par_iter()
            .map(|t| tile_fn(&labels, &edge_mask.edges, t))
            .collect()
    } else {
        edge_mask
            .tiles
            .iter()
            .map(|t| tile_fn(&labels, &edge_mask.edges, t))
            .collect()
    };

    let mut merged: BTreeMap<u32, BlobAccumulator> = BTreeMap::new();
    let mut skipped = Vec::new();
    for (tile, outcome) in edge_mask.tiles.iter().zip(per_tile) {
        match outcome {
            Ok(stats) => {
                for (label, acc) in stats {
                    merged
                        .entry(label)
                        .and_modify(|m| m.merge(&acc))
                        .or_insert(acc);
                }
            }
            Err(err) => skipped.push(TileDiagnostic::record(
                ProcessingStage::ComponentExtraction,
                tile.index,
                tile.bounds,
                err,
            )),
        }
    }

    let mut blobs: Vec<(u32, Blob)> = merged
        .into_iter()
        .map(|(label, acc)| (label, acc.into_blob()))
        .collect();
    blobs.sort_by_key(|(label, blob)| (blob.bbox.y, blob.bbox.x, *label));

    debug!(blobs = blobs.len(), skipped = skipped.len(), "components extracted");
    Components {
        blobs: blobs.into_iter().map(|(_, blob)| blob).collect(),
        skipped,
    }
}

/// Rejects components that cannot be glyphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingletonFilter {
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub min_area: u32,
    pub min_density: f32,
}

impl From<&DetectorParameters> for SingletonFilter {
    fn from(p: &DetectorParameters) -> Self {
        Self {
            min_aspect: p.single_min_aspect,
            max_aspect: p.single_max_aspect,
            min_area: p.single_min_area.max(0) as u32,
            min_density: p.single_min_density,
        }
    }
}

impl SingletonFilter {
    pub fn accepts(&self, blob: &Blob) -> bool {
        let aspect = blob.aspect();
        aspect >= self.min_aspect
            && aspect <= self.max_aspect
            && blob.area >= self.min_area
            && blob.density() >= self.min_density
    }

    /// Keeps the accepted blobs, preserving order.
    pub fn apply(&self, mut blobs: Vec<Blob>) -> Vec<Blob> {
        let before = blobs.len();
        blobs.retain(|b| self.accepts(b));
        debug!(before, after = blobs.len(), "singleton filter");
        blobs
    }
}
