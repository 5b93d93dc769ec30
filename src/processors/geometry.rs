//! Geometric primitives for text region detection.
//!
//! Two box types are used. [`PixelBox`] is an axis-aligned, half-open integer
//! rectangle used for blobs and clusters while the pipeline runs.
//! [`BoundingBox`] is a float polygon used when reporting regions, because a
//! region found in the deskewed image becomes a rotated quadrilateral once it
//! is mapped back onto the source image.

use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Rotates this point counter-clockwise (as seen on screen, y pointing
    /// down) by `degrees` around `center`.
    pub fn rotate_ccw_about(&self, center: Point, degrees: f32) -> Point {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Point::new(
            center.x + dx * cos + dy * sin,
            center.y - dx * sin + dy * cos,
        )
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned integer rectangle covering columns `x..x + width` and rows
/// `y..y + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from inclusive pixel bounds.
    pub fn from_inclusive(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Width over height; 0 for an empty box.
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn diagonal(&self) -> f32 {
        (self.width as f32).hypot(self.height as f32)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &PixelBox) -> PixelBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PixelBox::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Number of empty columns between the boxes; 0 when they overlap horizontally.
    pub fn horizontal_gap(&self, other: &PixelBox) -> u32 {
        if other.x >= self.right() {
            other.x - self.right()
        } else if self.x >= other.right() {
            self.x - other.right()
        } else {
            0
        }
    }

    /// Number of rows both boxes cover.
    pub fn vertical_overlap(&self, other: &PixelBox) -> u32 {
        let top = self.y.max(other.y);
        let bottom = self.bottom().min(other.bottom());
        bottom.saturating_sub(top)
    }

    /// Returns true if both boxes share at least one pixel.
    pub fn intersects(&self, other: &PixelBox) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// The four corners as a float polygon, clockwise from the top-left.
    pub fn to_bounding_box(&self) -> BoundingBox {
        BoundingBox::from_coords(
            self.x as f32,
            self.y as f32,
            self.right() as f32,
            self.bottom() as f32,
        )
    }
}

/// A bounding polygon represented by its corner points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The points that define the polygon.
    pub points: Vec<Point>,
}

impl BoundingBox {
    /// Creates a new bounding box from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a rectangle from its top-left and bottom-right corners.
    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let points = vec![
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ];
        Self { points }
    }

    /// Calculates the area of the polygon using the shoelace formula.
    ///
    /// Returns 0.0 if the polygon has fewer than 3 points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut area = 0.0;
        let n = self.points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area.abs() / 2.0
    }

    /// Gets the minimum x-coordinate, or 0.0 if there are no points.
    pub fn x_min(&self) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min)
    }

    /// Gets the minimum y-coordinate, or 0.0 if there are no points.
    pub fn y_min(&self) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min)
    }

    /// Gets the maximum x-coordinate, or 0.0 if there are no points.
    pub fn x_max(&self) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points
            .iter()
            .map(|p| p.x)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Gets the maximum y-coordinate, or 0.0 if there are no points.
    pub fn y_max(&self) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points
            .iter()
            .map(|p| p.y)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Mean of the corner points.
    pub fn center(&self) -> Point {
        if self.points.is_empty() {
            return Point::new(0.0, 0.0);
        }
        let n = self.points.len() as f32;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }

    /// Rotates every point counter-clockwise by `degrees` around `center`.
    pub fn rotate_ccw_about(&self, center: Point, degrees: f32) -> BoundingBox {
        BoundingBox::new(
            self.points
                .iter()
                .map(|p| p.rotate_ccw_about(center, degrees))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_pixel_box_edges_and_union() {
        let a = PixelBox::new(10, 5, 4, 6);
        let b = PixelBox::new(20, 2, 3, 3);
        assert_eq!((a.right(), a.bottom()), (14, 11));
        assert_eq!(a.union(&b), PixelBox::new(10, 2, 13, 9));
        assert_eq!(a.area(), 24);
        assert!(approx(a.aspect(), 4.0 / 6.0));
    }

    #[test]
    fn test_horizontal_gap() {
        let a = PixelBox::new(0, 0, 8, 14);
        let b = PixelBox::new(9, 0, 8, 14);
        assert_eq!(a.horizontal_gap(&b), 1);
        assert_eq!(b.horizontal_gap(&a), 1);
        let touching = PixelBox::new(8, 0, 2, 2);
        assert_eq!(a.horizontal_gap(&touching), 0);
        let overlapping = PixelBox::new(3, 20, 2, 2);
        assert_eq!(a.horizontal_gap(&overlapping), 0);
    }

    #[test]
    fn test_vertical_overlap() {
        let a = PixelBox::new(0, 10, 5, 10);
        assert_eq!(a.vertical_overlap(&PixelBox::new(50, 15, 5, 10)), 5);
        assert_eq!(a.vertical_overlap(&PixelBox::new(50, 20, 5, 10)), 0);
        assert_eq!(a.vertical_overlap(&PixelBox::new(50, 0, 5, 40)), 10);
    }

    #[test]
    fn test_from_inclusive() {
        let b = PixelBox::from_inclusive(3, 4, 3, 9);
        assert_eq!(b, PixelBox::new(3, 4, 1, 6));
    }

    #[test]
    fn test_rotation_direction() {
        let center = Point::new(0.0, 0.0);
        // On screen (y down), counter-clockwise takes +x towards -y.
        let p = Point::new(1.0, 0.0).rotate_ccw_about(center, 90.0);
        assert!(approx(p.x, 0.0));
        assert!(approx(p.y, -1.0));
    }

    #[test]
    fn test_rotation_round_trip() {
        let center = Point::new(50.0, 40.0);
        let p = Point::new(12.0, 77.0);
        let back = p.rotate_ccw_about(center, 10.0).rotate_ccw_about(center, -10.0);
        assert!(approx(back.x, p.x) && approx(back.y, p.y));
    }

    #[test]
    fn test_bounding_box_area_and_extent() {
        let bbox = PixelBox::new(0, 0, 10, 5).to_bounding_box();
        assert!(approx(bbox.area(), 50.0));
        assert!(approx(bbox.x_max(), 10.0));
        assert!(approx(bbox.y_max(), 5.0));

        let rotated = bbox.rotate_ccw_about(bbox.center(), 30.0);
        assert!((rotated.area() - 50.0).abs() < 1e-2);
    }
}
