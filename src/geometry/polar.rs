//! Polar offsets: where a connector sits relative to the piece that owns it.
//!
//! A connector is described in the owning piece's frame by a
//! [`PolarVector`]: go `magnitude` units in direction `angle` (relative to
//! the piece's heading), and face `exit_angle` away from that heading when
//! you get there. The two conversions here — owner pose to connector pose
//! and back — are exact algebraic inverses, which is what lets the editor
//! place a new piece from a target connector as well as the other way
//! around.

use super::Pose;

/// Immutable offset from a reference pose to one of its connection points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarVector {
    /// Distance from the reference position.
    pub magnitude: f64,
    /// Direction of the offset, relative to the reference heading.
    pub angle: f64,
    /// Heading change applied across the offset.
    pub exit_angle: f64,
}

impl PolarVector {
    pub fn new(magnitude: f64, angle: f64, exit_angle: f64) -> Self {
        Self {
            magnitude,
            angle,
            exit_angle,
        }
    }

    /// Absolute pose of the connection point, given the owning piece's pose.
    pub fn end_pose(&self, start: &Pose) -> Pose {
        let direction = start.angle() + self.angle;
        Pose::new(
            start.x + self.magnitude * direction.cos(),
            start.y + self.magnitude * direction.sin(),
            start.angle() + self.exit_angle,
        )
    }

    /// Pose a piece must take so that this offset lands on `end`.
    ///
    /// Exact inverse of [`end_pose`](Self::end_pose) for any input.
    pub fn start_pose(&self, end: &Pose) -> Pose {
        let heading = end.angle() - self.exit_angle;
        let direction = heading + self.angle;
        Pose::new(
            end.x - self.magnitude * direction.cos(),
            end.y - self.magnitude * direction.sin(),
            heading,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: &Pose, b: &Pose) -> bool {
        (a.x - b.x).abs() < EPSILON
            && (a.y - b.y).abs() < EPSILON
            && (a.angle() - b.angle()).abs() < EPSILON
    }

    #[test]
    fn end_pose_along_heading() {
        // Connector 10 units straight ahead, facing forward.
        let offset = PolarVector::new(10.0, 0.0, 0.0);
        let end = offset.end_pose(&Pose::new(0.0, 0.0, 0.0));
        assert!(approx_eq(&end, &Pose::new(10.0, 0.0, 0.0)));

        // Same offset on a piece heading straight down.
        let end = offset.end_pose(&Pose::new(5.0, 5.0, FRAC_PI_2));
        assert!(approx_eq(&end, &Pose::new(5.0, 15.0, FRAC_PI_2)));
    }

    #[test]
    fn exit_angle_turns_the_heading() {
        let offset = PolarVector::new(10.0, 0.0, FRAC_PI_4);
        let end = offset.end_pose(&Pose::new(0.0, 0.0, 0.0));
        assert!((end.angle() - FRAC_PI_4).abs() < EPSILON);
        // Position depends on `angle`, not `exit_angle`.
        assert!((end.x - 10.0).abs() < EPSILON);
    }

    #[test]
    fn start_pose_inverts_end_pose() {
        let cases = [
            PolarVector::new(10.0, 0.0, 0.0),
            PolarVector::new(4.5, FRAC_PI_2, PI),
            PolarVector::new(0.0, 1.0, -0.5),
            PolarVector::new(100.0, -FRAC_PI_4, 2.0 * PI / 3.0),
        ];
        let poses = [
            Pose::new(0.0, 0.0, 0.0),
            Pose::new(-3.0, 17.0, 1.2),
            Pose::new(1e6, -1e6, 5.9),
        ];
        for offset in &cases {
            for pose in &poses {
                let round = offset.start_pose(&offset.end_pose(pose));
                assert!(approx_eq(pose, &round), "{offset:?} at {pose:?}");
            }
        }
    }
}
