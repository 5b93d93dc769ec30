//! Page skew estimation and correction.
//!
//! The estimate is a projection-profile search over reduced copies of the
//! binary mask. For a candidate angle every foreground pixel is projected onto
//! the row it would occupy if the page were rotated back by that angle; text
//! lines collapse into few, dense rows at the right angle, which maximizes the
//! sum of squared differences between adjacent row counts. A pixel landing
//! between two rows is split between them, so the score varies smoothly with
//! the angle.
//!
//! Angles are in degrees; positive means the content is rotated
//! counter-clockwise as seen on screen.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, warp_with};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::binarize::FOREGROUND;
use super::geometry::Point;
use crate::core::config::DetectorParameters;

/// Relative score gain a refinement candidate needs before the search moves to it.
const MIN_REFINE_GAIN: f64 = 0.05;

/// Skew search settings, taken from the sanitized parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewParams {
    pub min_angle: f32,
    pub sweep_range: f32,
    pub sweep_delta: f32,
    pub sweep_reduction: u32,
    pub search_reduction: u32,
    pub search_min_delta: f32,
}

impl From<&DetectorParameters> for SkewParams {
    fn from(p: &DetectorParameters) -> Self {
        Self {
            min_angle: p.skew_min_angle.max(0.0),
            sweep_range: p.skew_sweep_range.max(0.0),
            sweep_delta: p.skew_sweep_delta,
            sweep_reduction: p.skew_sweep_reduction.max(1) as u32,
            search_reduction: p.skew_search_reduction.max(1) as u32,
            search_min_delta: p.skew_search_min_delta,
        }
    }
}

/// Result of [`estimate_skew`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkewEstimate {
    /// Reported angle; 0 when the raw estimate is below `min_angle`.
    pub angle: f32,
    /// Best angle found by the search, before the `min_angle` cut.
    pub raw_angle: f32,
    /// Best angle of the coarse sweep.
    pub sweep_angle: f32,
    /// Projection score of `raw_angle` at the resolution of the last refinement step.
    pub score: f64,
    /// Number of angles scored.
    pub evaluations: usize,
}

impl SkewEstimate {
    /// Returns true if the page should be rotated.
    pub fn needs_correction(&self) -> bool {
        self.angle != 0.0
    }

    fn level() -> Self {
        Self {
            angle: 0.0,
            raw_angle: 0.0,
            sweep_angle: 0.0,
            score: 0.0,
            evaluations: 0,
        }
    }
}

/// Shrinks a binary mask by `factor`; a reduced pixel is set if any pixel of
/// its block is set.
pub fn reduce_mask(mask: &GrayImage, factor: u32) -> GrayImage {
    let factor = factor.max(1);
    if factor == 1 {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();
    let mut reduced = GrayImage::new(width.div_ceil(factor), height.div_ceil(factor));
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == FOREGROUND {
            reduced.put_pixel(x / factor, y / factor, Luma([FOREGROUND]));
        }
    }
    reduced
}

struct Projection {
    points: Vec<(u32, u32)>,
    width: u32,
    height: u32,
}

impl Projection {
    fn new(mask: &GrayImage) -> Self {
        let points = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == FOREGROUND)
            .map(|(x, y, _)| (x, y))
            .collect();
        Self {
            points,
            width: mask.width(),
            height: mask.height(),
        }
    }

    /// Returns true if rotating by `step` degrees moves the far column of the
    /// mask by at least one row.
    fn resolves(&self, step: f32) -> bool {
        f64::from(self.width) * f64::from(step).to_radians().tan() >= 1.0
    }

    fn score(&self, angle: f32) -> f64 {
        let tan = f64::from(angle).to_radians().tan();
        let offset = (f64::from(self.width) * tan.abs()).ceil() + 1.0;
        let len = self.height as usize + 2 * offset as usize + 2;
        let mut rows = vec![0f64; len];
        for &(x, y) in &self.points {
            let pos = f64::from(y) + f64::from(x) * tan + offset;
            let row = pos.floor();
            let frac = pos - row;
            let row = row as usize;
            rows[row] += 1.0 - frac;
            rows[row + 1] += frac;
        }
        rows.iter()
            .tuple_windows()
            .map(|(a, b)| (b - a).powi(2))
            .sum()
    }
}

/// Estimates the skew of a binary mask.
///
/// A coarse sweep visits 0, ±δ, ±2δ, … up to ±`sweep_range` at
/// `sweep_reduction`. The winner is refined by probing ±δ/2, ±δ/4, … until the
/// step drops below `search_min_delta`. Candidates are scored at
/// `search_reduction` while that mask can resolve the step and on the full
/// mask afterwards. The search moves only when a candidate beats the current score
/// by more than `MIN_REFINE_GAIN`.
pub fn estimate_skew(mask: &GrayImage, params: &SkewParams) -> SkewEstimate {
    let sweep = Projection::new(&reduce_mask(mask, params.sweep_reduction));
    if sweep.points.is_empty() || params.sweep_delta <= 0.0 {
        return SkewEstimate::level();
    }

    let mut evaluations = 1;
    let mut sweep_angle = 0.0f32;
    let mut sweep_score = sweep.score(0.0);
    let steps = (params.sweep_range / params.sweep_delta).floor() as i32;
    for i in 1..=steps {
        for sign in [1.0f32, -1.0] {
            let angle = sign * i as f32 * params.sweep_delta;
            let score = sweep.score(angle);
            evaluations += 1;
            if score > sweep_score {
                sweep_score = score;
                sweep_angle = angle;
            }
        }
    }

    let mut full_resolution = params.search_reduction <= 1;
    let mut search = Projection::new(&reduce_mask(mask, params.search_reduction));
    let mut angle = sweep_angle;
    let mut score = search.score(angle);
    evaluations += 1;
    let mut step = params.sweep_delta / 2.0;
    while step >= params.search_min_delta && params.search_min_delta > 0.0 {
        if !full_resolution && !search.resolves(step) {
            full_resolution = true;
            search = Projection::new(mask);
            score = search.score(angle);
            evaluations += 1;
        }
        let up = search.score(angle + step);
        let down = search.score(angle - step);
        evaluations += 2;
        let best = up.max(down);
        if best > score * (1.0 + MIN_REFINE_GAIN) {
            angle += if up >= down { step } else { -step };
            score = best;
        }
        step /= 2.0;
    }

    let reported = if angle.abs() < params.min_angle {
        0.0
    } else {
        angle
    };
    debug!(
        sweep_angle,
        raw_angle = angle,
        angle = reported,
        evaluations,
        "skew estimated"
    );

    SkewEstimate {
        angle: reported,
        raw_angle: angle,
        sweep_angle,
        score,
        evaluations,
    }
}

/// Center used for deskew rotation and for mapping regions back to the source.
pub fn rotation_center(width: u32, height: u32) -> Point {
    Point::new(width as f32 / 2.0, height as f32 / 2.0)
}

/// Rotates `gray` clockwise by `angle` degrees about its center, undoing a
/// counter-clockwise skew of the same angle.
///
/// Uses bilinear sampling; pixels that fall outside the source are white.
pub fn deskew(gray: &GrayImage, angle: f32) -> GrayImage {
    if angle == 0.0 {
        return gray.clone();
    }
    let center = rotation_center(gray.width(), gray.height());
    warp_with(
        gray,
        move |x, y| {
            let source = Point::new(x + 0.5, y + 0.5).rotate_ccw_about(center, angle);
            (source.x - 0.5, source.y - 0.5)
        },
        Interpolation::Bilinear,
        Luma([255u8]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SkewParams {
        SkewParams::from(&DetectorParameters::default())
    }

    /// Thick lines rising to the right at `degrees`.
    fn sheared_lines(degrees: f32) -> GrayImage {
        let (width, height) = (400u32, 300u32);
        let tan = degrees.to_radians().tan();
        let mut mask = GrayImage::new(width, height);
        for y0 in (80..=240).step_by(40) {
            for x in 0..width {
                let y = y0 as f32 - x as f32 * tan;
                for t in 0..3 {
                    let yy = y.round() as i32 + t;
                    if (0..height as i32).contains(&yy) {
                        mask.put_pixel(x, yy as u32, Luma([FOREGROUND]));
                    }
                }
            }
        }
        mask
    }

    #[test]
    fn test_reduce_mask_is_or() {
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(7, 7, Luma([FOREGROUND]));
        let reduced = reduce_mask(&mask, 4);
        assert_eq!(reduced.dimensions(), (2, 2));
        assert_eq!(reduced.get_pixel(1, 1)[0], FOREGROUND);
        assert_eq!(reduced.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_blank_mask_is_level() {
        let estimate = estimate_skew(&GrayImage::new(100, 100), &params());
        assert_eq!(estimate.angle, 0.0);
        assert_eq!(estimate.evaluations, 0);
    }

    #[test]
    fn test_horizontal_lines_are_level() {
        let estimate = estimate_skew(&sheared_lines(0.0), &params());
        assert_eq!(estimate.sweep_angle, 0.0);
        assert_eq!(estimate.angle, 0.0);
        assert!(!estimate.needs_correction());
    }

    #[test]
    fn test_counter_clockwise_skew() {
        let p = params();
        let estimate = estimate_skew(&sheared_lines(10.0), &p);
        assert_eq!(estimate.sweep_angle, 10.0);
        assert!((estimate.angle - 10.0).abs() <= p.search_min_delta, "{estimate:?}");
    }

    #[test]
    fn test_clockwise_skew_between_sweep_steps() {
        let estimate = estimate_skew(&sheared_lines(-7.0), &params());
        assert!((estimate.angle + 7.0).abs() <= 0.5, "{estimate:?}");
    }

    #[test]
    fn test_small_skew_reported_as_zero() {
        let mut p = params();
        p.min_angle = 20.0;
        let estimate = estimate_skew(&sheared_lines(10.0), &p);
        assert_eq!(estimate.angle, 0.0);
        assert!(estimate.raw_angle > 5.0);
    }

    #[test]
    fn test_deskew_zero_is_identity() {
        let mut img = GrayImage::from_pixel(20, 10, Luma([255]));
        img.put_pixel(3, 4, Luma([0]));
        assert_eq!(deskew(&img, 0.0), img);
    }

    #[test]
    fn test_deskew_fills_white() {
        let img = GrayImage::from_pixel(40, 30, Luma([255]));
        let rotated = deskew(&img, 12.0);
        assert!(rotated.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_deskew_levels_sheared_lines() {
        let mut gray = GrayImage::from_pixel(400, 300, Luma([255]));
        for (x, y, p) in sheared_lines(10.0).enumerate_pixels() {
            if p[0] == FOREGROUND {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
        let straight = deskew(&gray, 10.0);
        let mut mask = GrayImage::new(400, 300);
        for (x, y, p) in straight.enumerate_pixels() {
            if p[0] < 128 {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        let estimate = estimate_skew(&mask, &params());
        assert!(estimate.raw_angle.abs() < 1.0, "{estimate:?}");
    }
}
