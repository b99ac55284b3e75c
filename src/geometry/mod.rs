//! Geometric primitives shared across the core.
//!
//! The editor works in a single 2D coordinate space with the Y axis pointing
//! down (screen convention). Angles are radians, measured clockwise from the
//! positive X axis, and every stored angle is kept normalized to `[0, 2π)`.

pub mod polar;
pub mod pose;

pub use polar::PolarVector;
pub use pose::Pose;

use std::f64::consts::TAU;

/// Normalize an angle into `[0, 2π)`.
///
/// Works for arbitrarily large negative and positive inputs. The guard after
/// `rem_euclid` covers the rounding case where the remainder lands exactly on
/// `2π`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a >= TAU {
        0.0
    } else {
        a
    }
}

/// A 2D point in the coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A bounding box representing the spatial extent of a piece or group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a zero-sized bounding box at the origin
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Build a box from min/max extents
    pub fn from_extents(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Right edge x-coordinate
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point of the bounding box
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Translate the box by the given offset
    pub fn translated(&self, dx: f64, dy: f64) -> BoundingBox {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Check if this bounding box intersects another
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Compute the union of two bounding boxes (smallest box containing both)
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(x, y, right - x, bottom - y)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn normalize_wraps_negative_angles() {
        assert!((normalize_angle(-PI / 2.0) - 3.0 * PI / 2.0).abs() < EPSILON);
    }

    #[test]
    fn normalize_is_idempotent_in_range() {
        for a in [0.0, 0.5, PI, 6.0] {
            assert!((normalize_angle(a) - a).abs() < EPSILON);
        }
    }

    #[test]
    fn normalize_handles_large_multiples() {
        let a = normalize_angle(7.0 * TAU + 1.25);
        assert!((a - 1.25).abs() < 1e-9);
        assert!((0.0..TAU).contains(&normalize_angle(1e6)));
    }

    #[test]
    fn union_contains_both_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, -5.0, 5.0, 5.0);
        let u = a.union(&b);
        assert_eq!(u, BoundingBox::from_extents(0.0, -5.0, 25.0, 10.0));
    }

    #[test]
    fn center_of_translated_box() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 20.0).translated(5.0, 5.0);
        assert_eq!(b.center(), Point::new(10.0, 15.0));
    }
}
