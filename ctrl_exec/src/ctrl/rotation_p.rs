//! # Differential rotation proportional control law
//!
//! Turns the robot on the spot towards the heading of the first pose of the
//! path, with an angular velocity proportional to the heading error.
//!
//! The law doesn't look for the nearest waypoint itself. Whoever owns the path
//! keeps pose 0 as the next target, by trimming or replacing the path as
//! targets are reached.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

// External
use log::trace;
use serde::{Deserialize, Serialize};

// Internal
use super::*;
use util::maths::wrap_pi_once;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the rotation law
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationPParams {
    /// Velocity limits
    #[serde(flatten)]
    pub limits: ControlLawParams,

    /// Proportional gain on the heading error
    pub p_gain: f64,
}

#[derive(Debug, Clone)]
pub struct DifferentialRotationP {
    params: RotationPParams,

    path: Option<Arc<Path>>,

    /// Absolute heading error as of the last command
    angular_distance_to_goal: f64,

    /// Goal heading used by the last command
    goal_angle_rad: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DifferentialRotationP {
    /// Create a new law with no path attached.
    pub fn new(params: RotationPParams) -> Result<Self, ControlLawError> {
        params.limits.validate()?;
        if !params.p_gain.is_finite() {
            return Err(ControlLawError::InvalidGain("p_gain", params.p_gain));
        }

        Ok(Self {
            params,
            path: None,
            angular_distance_to_goal: FAR_DISTANCE_TO_GOAL,
            goal_angle_rad: None,
        })
    }

    /// The command for a given heading error.
    ///
    /// Linear velocity is always zero. The angular velocity is only saturated
    /// from above, a large negative error gives a demand below
    /// `-maximum_angular_velocity`.
    pub fn command_for_error(&self, angular_error_rad: f64) -> VelocityCmd {
        VelocityCmd {
            lin_vel_ms: 0.0,
            ang_vel_rads: (self.params.p_gain * angular_error_rad)
                .min(self.params.limits.maximum_angular_velocity),
        }
    }

    /// Goal heading used by the last command, `None` if no command has been
    /// computed since the path was attached.
    pub fn goal_angle(&self) -> Option<f64> {
        self.goal_angle_rad
    }

    pub fn p_gain(&self) -> f64 {
        self.params.p_gain
    }
}

impl ControlLaw for DifferentialRotationP {
    fn name(&self) -> &'static str {
        ControlLawKind::DifferentialRotationP.name()
    }

    fn params(&self) -> &ControlLawParams {
        &self.params.limits
    }

    fn path(&self) -> Option<&Arc<Path>> {
        self.path.as_ref()
    }

    fn update_path(&mut self, new_path: Arc<Path>) {
        self.path = Some(new_path);
        self.angular_distance_to_goal = FAR_DISTANCE_TO_GOAL;
        self.goal_angle_rad = None;
    }

    fn compute_command_vector(&mut self, state: &Pose) -> Result<VelocityCmd, ControlLawError> {
        let path = self.path.as_ref().ok_or(ControlLawError::NoPath)?;

        let current_angle_rad = state.get_heading();
        let goal_angle_rad = path.start().get_heading();

        let error_rad = compute_angular_error(goal_angle_rad, current_angle_rad);
        let cmd = self.command_for_error(error_rad);

        // Only mutation of the law's state
        self.goal_angle_rad = Some(goal_angle_rad);
        self.angular_distance_to_goal = error_rad.abs();

        trace!(
            "Rotation P: goal {:.4} rad, current {:.4} rad, error {:.4} rad, cmd {:?}",
            goal_angle_rad, current_angle_rad, error_rad, cmd
        );

        Ok(cmd)
    }

    fn distance_to_goal(&self) -> f64 {
        self.angular_distance_to_goal
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Signed heading error from `current_rad` to `goal_rad`.
///
/// Both angles are expected in [-pi, pi], so a single 2pi correction is enough
/// to bring the result back into that range.
pub fn compute_angular_error(goal_rad: f64, current_rad: f64) -> f64 {
    wrap_pi_once(goal_rad - current_rad)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
