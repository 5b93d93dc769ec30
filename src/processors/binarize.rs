//! Edge-based binarization over a tile grid.
//!
//! The source is turned into an edge-strength map (Sobel magnitude, scaled to
//! 8 bits). The map is cut into tiles; a tile whose mean edge strength is below
//! `edge_avg_thresh` is treated as empty and left blank in the mask, every
//! other tile marks pixels with edge strength at or above `edge_thresh` as
//! foreground (255).

use image::{GrayImage, Luma};
use imageproc::gradients::sobel_gradients;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::geometry::PixelBox;
use crate::core::config::DetectorParameters;
use crate::core::errors::constructors::try_zeroed_buffer;
use crate::core::errors::{DetectError, DetectResult, ProcessingStage};

/// Foreground value in binary masks.
pub const FOREGROUND: u8 = 255;

/// Regular grid of tiles over an image; the last row and column may be partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub rows: u32,
}

impl TileGrid {
    /// Builds the grid. A tile size <= 0 spans the whole image in that direction.
    pub fn new(width: u32, height: u32, tile_x: i32, tile_y: i32) -> Self {
        let tile_width = if tile_x <= 0 {
            width.max(1)
        } else {
            tile_x as u32
        };
        let tile_height = if tile_y <= 0 {
            height.max(1)
        } else {
            tile_y as u32
        };
        Self {
            width,
            height,
            tile_width,
            tile_height,
            columns: width.div_ceil(tile_width),
            rows: height.div_ceil(tile_height),
        }
    }

    pub fn len(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounds of tile `index`, counted row by row.
    pub fn tile(&self, index: usize) -> PixelBox {
        let col = index as u32 % self.columns;
        let row = index as u32 / self.columns;
        let x = col * self.tile_width;
        let y = row * self.tile_height;
        PixelBox::new(
            x,
            y,
            self.tile_width.min(self.width - x),
            self.tile_height.min(self.height - y),
        )
    }

    /// Index of the tile containing pixel `(x, y)`.
    pub fn index_of(&self, x: u32, y: u32) -> usize {
        ((y / self.tile_height) * self.columns + x / self.tile_width) as usize
    }
}

/// A tile that passed the content test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRegion {
    pub index: usize,
    pub bounds: PixelBox,
    pub mean_edge: f32,
}

/// A tile that was skipped because processing it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileDiagnostic {
    pub stage: ProcessingStage,
    pub index: usize,
    pub bounds: PixelBox,
    pub message: String,
}

impl TileDiagnostic {
    /// Logs the failure and turns it into a diagnostic.
    pub(crate) fn record(
        stage: ProcessingStage,
        index: usize,
        bounds: PixelBox,
        err: TileError,
    ) -> Self {
        let message = err.to_string();
        let err = DetectError::tile_failure(stage, index, err);
        warn!(tile = index, error = %err, "skipping tile");
        Self {
            stage,
            index,
            bounds,
            message,
        }
    }
}

/// Failure of the work on a single tile.
#[derive(Error, Debug)]
pub enum TileError {
    #[error("tile {bounds:?} exceeds the {width}x{height} image")]
    OutOfBounds {
        bounds: PixelBox,
        width: u32,
        height: u32,
    },

    #[error("could not reserve {bytes} bytes for the tile")]
    Allocation { bytes: usize },
}

impl TileError {
    /// Checks that `bounds` lies inside a `width` x `height` image.
    pub(crate) fn check_bounds(bounds: PixelBox, width: u32, height: u32) -> Result<(), Self> {
        if bounds.right() > width || bounds.bottom() > height {
            Err(Self::OutOfBounds {
                bounds,
                width,
                height,
            })
        } else {
            Ok(())
        }
    }
}

/// Thresholds for one binarization pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinarizeParams {
    pub tile_x: i32,
    pub tile_y: i32,
    pub edge_thresh: u8,
    pub edge_avg_thresh: f32,
}

impl From<&DetectorParameters> for BinarizeParams {
    fn from(p: &DetectorParameters) -> Self {
        Self {
            tile_x: p.edge_tile_x,
            tile_y: p.edge_tile_y,
            edge_thresh: p.edge_thresh.clamp(0, 255) as u8,
            edge_avg_thresh: p.edge_avg_thresh.max(0) as f32,
        }
    }
}

/// Output of [`binarize`].
#[derive(Debug, Clone)]
pub struct EdgeMask {
    /// Scaled Sobel magnitude of the input.
    pub edges: GrayImage,
    /// Binary foreground mask (0 or [`FOREGROUND`]).
    pub mask: GrayImage,
    pub grid: TileGrid,
    /// Non-empty tiles in index order.
    pub tiles: Vec<TileRegion>,
    /// Tiles dropped because of a processing error.
    pub skipped: Vec<TileDiagnostic>,
}

impl EdgeMask {
    pub fn foreground_count(&self) -> usize {
        self.mask.as_raw().iter().filter(|&&v| v == FOREGROUND).count()
    }
}

/// Result of thresholding one tile.
pub(crate) enum TileOutcome {
    Empty,
    Content { mean_edge: f32, pixels: Vec<u8> },
}

/// Sobel gradient magnitude divided by 4, saturated to `u8`.
pub fn edge_map(gray: &GrayImage) -> GrayImage {
    let gradients = sobel_gradients(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([(gradients.get_pixel(x, y)[0] / 4).min(255) as u8])
    })
}

pub(crate) fn threshold_tile(
    edges: &GrayImage,
    bounds: PixelBox,
    params: &BinarizeParams,
) -> Result<TileOutcome, TileError> {
    TileError::check_bounds(bounds, edges.width(), edges.height())?;

    let mut sum = 0u64;
    for y in bounds.y..bounds.bottom() {
        for x in bounds.x..bounds.right() {
            sum += u64::from(edges.get_pixel(x, y)[0]);
        }
    }
    let mean_edge = (sum as f64 / bounds.area().max(1) as f64) as f32;
    if mean_edge < params.edge_avg_thresh {
        return Ok(TileOutcome::Empty);
    }

    let len = bounds.area() as usize;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(len)
        .map_err(|_| TileError::Allocation { bytes: len })?;
    for y in bounds.y..bounds.bottom() {
        for x in bounds.x..bounds.right() {
            let on = edges.get_pixel(x, y)[0] >= params.edge_thresh;
            pixels.push(if on { FOREGROUND } else { 0 });
        }
    }
    Ok(TileOutcome::Content { mean_edge, pixels })
}

/// Builds the edge map and the tiled foreground mask of `gray`.
///
/// Tiles are thresholded independently, on rayon workers when `parallel` is
/// set, and stitched back together in tile order so the mask never depends on
/// scheduling. A tile that fails is left blank and reported in
/// [`EdgeMask::skipped`].
///
/// # Errors
///
/// `InvalidInput` for a zero-area image, `ResourceExhausted` if the mask buffer
/// cannot be allocated.
pub fn binarize(gray: &GrayImage, params: &BinarizeParams, parallel: bool) -> DetectResult<EdgeMask> {
    binarize_with(gray, params, parallel, threshold_tile)
}

/// [`binarize`] with `tile_fn` doing the work on each tile.
pub(crate) fn binarize_with<F>(
    gray: &GrayImage,
    params: &BinarizeParams,
    parallel: bool,
    tile_fn: F,
) -> DetectResult<EdgeMask>
where
    F: Fn(&GrayImage, PixelBox, &BinarizeParams) -> Result<TileOutcome, TileError> + Sync,
{
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::invalid_input(format!(
            "source image has zero area ({width}x{height})"
        )));
    }

    let edges = edge_map(gray);
    let grid = TileGrid::new(width, height, params.tile_x, params.tile_y);
    let bounds: Vec<PixelBox> = (0..grid.len()).map(|i| grid.tile(i)).collect();

    let outcomes: Vec<Result<TileOutcome, TileError>> = if parallel {
        bounds
            .par_iter()
            .map(|b| tile_fn(&edges, *b, params))
            .collect()
    } else {
        bounds
            .iter()
            .map(|b| tile_fn(&edges, *b, params))
            .collect()
    };

    let mut buffer = try_zeroed_buffer("binary mask", width as usize * height as usize)?;
    let mut tiles = Vec::new();
    let mut skipped = Vec::new();

    for (index, (tile, outcome)) in bounds.iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(TileOutcome::Empty) => {}
            Ok(TileOutcome::Content { mean_edge, pixels }) => {
                let row_len = tile.width as usize;
                for (row, chunk) in pixels.chunks_exact(row_len).enumerate() {
                    let start = (tile.y as usize + row) * width as usize + tile.x as usize;
                    buffer[start..start + row_len].copy_from_slice(chunk);
                }
                tiles.push(TileRegion {
                    index,
                    bounds: *tile,
                    mean_edge,
                });
            }
            Err(err) => skipped.push(TileDiagnostic::record(
                ProcessingStage::Binarization,
                index,
                *tile,
                err,
            )),
        }
    }

    let mask = GrayImage::from_raw(width, height, buffer)
        .ok_or_else(|| DetectError::invalid_input("mask buffer does not match image size"))?;

    debug!(
        tiles = grid.len(),
        non_empty = tiles.len(),
        skipped = skipped.len(),
        parallel,
        "binarized"
    );

    Ok(EdgeMask {
        edges,
        mask,
        grid,
        tiles,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BinarizeParams {
        BinarizeParams::from(&DetectorParameters::default())
    }

    fn block_image() -> GrayImage {
        let mut img = GrayImage::from_pixel(96, 80, Luma([255]));
        for y in 20..32 {
            for x in 40..46 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img
    }

    #[test]
    fn test_grid_partial_tiles() {
        let grid = TileGrid::new(100, 70, 32, 64);
        assert_eq!((grid.columns, grid.rows), (4, 2));
        assert_eq!(grid.len(), 8);
        assert_eq!(grid.tile(3), PixelBox::new(96, 0, 4, 64));
        assert_eq!(grid.tile(7), PixelBox::new(96, 64, 4, 6));
        assert_eq!(grid.index_of(97, 65), 7);
    }

    #[test]
    fn test_degenerate_tile_size_is_single_tile() {
        let grid = TileGrid::new(100, 70, 0, -5);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.tile(0), PixelBox::new(0, 0, 100, 70));
    }

    #[test]
    fn test_zero_area_fails() {
        let err = binarize(&GrayImage::new(0, 10), &params(), false).unwrap_err();
        assert!(matches!(err, DetectError::InvalidInput { .. }));
    }

    #[test]
    fn test_blank_image_has_no_content() {
        let img = GrayImage::from_pixel(100, 100, Luma([255]));
        let result = binarize(&img, &params(), false).unwrap();
        assert!(result.tiles.is_empty());
        assert_eq!(result.foreground_count(), 0);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_block_edges_form_ring() {
        let result = binarize(&block_image(), &params(), false).unwrap();
        // The 6x12 block produces a two pixel wide ring around its outline.
        assert_eq!(result.mask.get_pixel(39, 25)[0], FOREGROUND);
        assert_eq!(result.mask.get_pixel(40, 25)[0], FOREGROUND);
        assert_eq!(result.mask.get_pixel(42, 25)[0], 0);
        assert_eq!(result.mask.get_pixel(46, 25)[0], FOREGROUND);
        assert_eq!(result.mask.get_pixel(47, 25)[0], 0);
        assert_eq!(result.mask.get_pixel(10, 10)[0], 0);
        assert_eq!(result.tiles.len(), 1);
        assert_eq!(result.tiles[0].index, 1);
    }

    #[test]
    fn test_empty_tiles_are_cleared() {
        let mut p = params();
        p.edge_avg_thresh = 1000.0;
        let result = binarize(&block_image(), &p, false).unwrap();
        assert_eq!(result.foreground_count(), 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let img = block_image();
        let mut p = params();
        p.tile_x = 8;
        p.tile_y = 8;
        let sequential = binarize(&img, &p, false).unwrap();
        let parallel = binarize(&img, &p, true).unwrap();
        assert_eq!(sequential.mask, parallel.mask);
        assert_eq!(sequential.tiles, parallel.tiles);
    }

    #[test]
    fn test_tile_outside_edge_map_is_rejected() {
        let edges = GrayImage::new(10, 10);
        let result = threshold_tile(&edges, PixelBox::new(5, 5, 8, 8), &params());
        assert!(matches!(result, Err(TileError::OutOfBounds { .. })));
    }

    #[test]
    fn test_failing_tile_is_skipped() {
        let img = block_image();
        let mut p = params();
        p.tile_x = 8;
        p.tile_y = 8;
        let failing = |edges: &GrayImage, bounds: PixelBox, params: &BinarizeParams| {
            if bounds.x == 40 && bounds.y == 24 {
                Err(TileError::Allocation { bytes: 64 })
            } else {
                threshold_tile(edges, bounds, params)
            }
        };
        let reference = binarize(&img, &p, false).unwrap();
        let result = binarize_with(&img, &p, true, failing).unwrap();

        assert_eq!(result.skipped.len(), 1);
        let skipped = &result.skipped[0];
        assert_eq!(skipped.stage, ProcessingStage::Binarization);
        assert_eq!(skipped.bounds, PixelBox::new(40, 24, 8, 8));
        assert_eq!(skipped.index, result.grid.index_of(40, 24));
        assert!(result.tiles.iter().all(|t| t.index != skipped.index));
        assert_eq!(result.tiles.len(), reference.tiles.len() - 1);
        // The rest of the outline survives, the failed tile stays blank.
        assert_eq!(result.mask.get_pixel(39, 25)[0], FOREGROUND);
        assert_eq!(result.mask.get_pixel(40, 25)[0], 0);
    }
}
