//! # Localisation module
//!
//! This module defines the pose type shared by paths and the robot state.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A pose (position and attitude in the world frame).
///
/// Both path waypoints and the current state of the robot are expressed as
/// poses. Control laws only use the planar position and heading, the rest of
/// the pose is carried through untouched.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    /// The position in the world frame
    pub position_m: Vector3<f64>,

    /// The attitude in the world frame
    pub attitude_q: UnitQuaternion<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Pose {
    fn default() -> Self {
        Self {
            position_m: Vector3::zeros(),
            attitude_q: UnitQuaternion::identity(),
        }
    }
}

impl Pose {
    pub fn new(position_m: Vector3<f64>, attitude_q: UnitQuaternion<f64>) -> Self {
        Self {
            position_m,
            attitude_q,
        }
    }

    /// Create a pose on the XY plane with the given heading.
    pub fn new_planar(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector3::new(x_m, y_m, 0.0),
            attitude_q: UnitQuaternion::from_euler_angles(0.0, 0.0, heading_rad),
        }
    }

    /// Create a pose from the `[x, y, z, roll, pitch, yaw]` layout used by
    /// path files.
    pub fn from_xyz_rpy(values: [f64; 6]) -> Self {
        Self {
            position_m: Vector3::new(values[0], values[1], values[2]),
            attitude_q: UnitQuaternion::from_euler_angles(values[3], values[4], values[5]),
        }
    }

    /// Return the pose in the `[x, y, z, roll, pitch, yaw]` layout.
    pub fn to_xyz_rpy(&self) -> [f64; 6] {
        let (roll, pitch, yaw) = self.attitude_q.euler_angles();
        [
            self.position_m[0],
            self.position_m[1],
            self.position_m[2],
            roll,
            pitch,
            yaw,
        ]
    }

    /// Return the heading (angle to the positive X axis) in radians, in the
    /// range [-pi, pi].
    pub fn get_heading(&self) -> f64 {
        self.attitude_q.euler_angles().2
    }

    /// The position projected onto the XY plane.
    pub fn position2(&self) -> Vector2<f64> {
        Vector2::new(self.position_m[0], self.position_m[1])
    }

    /// `true` if every component of the pose is finite.
    pub fn is_finite(&self) -> bool {
        self.position_m.iter().all(|v| v.is_finite())
            && self.attitude_q.coords.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_heading() {
        let pose = Pose::new_planar(1.0, 2.0, 3.0);
        assert!((pose.get_heading() - 3.0).abs() < 1e-12);
        assert_eq!(pose.position2(), Vector2::new(1.0, 2.0));

        let pose = Pose::from_xyz_rpy([1.0, 2.0, 0.5, 0.0, 0.0, -3.0]);
        assert!((pose.get_heading() + 3.0).abs() < 1e-12);
        assert_eq!(pose.position_m[2], 0.5);

        let xyz_rpy = pose.to_xyz_rpy();
        assert!((xyz_rpy[5] + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_is_finite() {
        assert!(Pose::default().is_finite());
        assert!(!Pose::new_planar(f64::NAN, 0.0, 0.0).is_finite());
    }
}
