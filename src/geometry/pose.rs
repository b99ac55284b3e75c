//! Rigid-body pose: a position plus a heading.
//!
//! `Pose` is the value type every placed piece carries. It is `Copy` and is
//! always passed and stored by value; nothing in the core hands out aliases
//! to a pose. The heading invariant — `angle ∈ [0, 2π)` — is maintained by
//! every constructor and every mutating operation, so downstream angle
//! comparisons never need to re-normalize.

use super::normalize_angle;
use std::f64::consts::{PI, TAU};
use std::ops::{Add, Sub};

/// Tolerance used by [`Pose::has_opposite_angle`].
pub const OPPOSITE_ANGLE_EPSILON: f64 = 1e-10;

/// Position and heading of a piece in its container's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in radians, always normalized to `[0, 2π)`.
    angle: f64,
}

impl Pose {
    /// Create a pose, normalizing the angle into `[0, 2π)`.
    pub fn new(x: f64, y: f64, angle: f64) -> Self {
        Self {
            x,
            y,
            angle: normalize_angle(angle),
        }
    }

    /// The heading, guaranteed to be in `[0, 2π)`.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Overwrite the heading, normalizing on write.
    pub fn set_angle(&mut self, angle: f64) {
        self.angle = normalize_angle(angle);
    }

    /// Rotate this pose around `(cx, cy)` by `delta` radians (clockwise in
    /// the Y-down convention), turning the heading by the same amount.
    ///
    /// Standard rigid rotation: translate so the center is at the origin,
    /// apply the rotation matrix, translate back.
    pub fn rotate_around(self, cx: f64, cy: f64, delta: f64) -> Self {
        let (sin, cos) = delta.sin_cos();
        let dx = self.x - cx;
        let dy = self.y - cy;
        Self::new(
            cx + dx * cos - dy * sin,
            cy + dx * sin + dy * cos,
            self.angle + delta,
        )
    }

    /// Axis-aligned proximity test: true iff both `|Δx| ≤ radius` and
    /// `|Δy| ≤ radius`.
    ///
    /// This is a box test, not a Euclidean distance check: two poses can be
    /// up to `radius·√2` apart and still pass. Snap matching relies on this
    /// exact behavior.
    pub fn is_in_radius(&self, other: &Pose, radius: f64) -> bool {
        (self.x - other.x).abs() <= radius && (self.y - other.y).abs() <= radius
    }

    /// True iff the two headings point at each other (differ by π), within
    /// [`OPPOSITE_ANGLE_EPSILON`]. Used to test that two connectors face
    /// each other before snapping.
    pub fn has_opposite_angle(&self, other: &Pose) -> bool {
        let diff = normalize_angle(self.angle - other.angle + PI);
        diff < OPPOSITE_ANGLE_EPSILON || TAU - diff < OPPOSITE_ANGLE_EPSILON
    }

    /// Euclidean norm of `(x, y)` treated as a vector.
    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Component-wise addition of `(x, y, angle)`, with the resulting angle
/// normalized. This is offset bookkeeping (drag deltas and the like), not a
/// composition of rigid transforms.
impl Add for Pose {
    type Output = Pose;

    fn add(self, rhs: Pose) -> Pose {
        Pose::new(self.x + rhs.x, self.y + rhs.y, self.angle + rhs.angle)
    }
}

/// Component-wise subtraction; see the note on [`Add`].
impl Sub for Pose {
    type Output = Pose;

    fn sub(self, rhs: Pose) -> Pose {
        Pose::new(self.x - rhs.x, self.y - rhs.y, self.angle - rhs.angle)
    }
}
