//! # Control law module
//!
//! A control law maps the current state of the robot and the geometry of the
//! attached path to a velocity command. All control laws implement the
//! [`ControlLaw`] trait and are built from a parameter file by name, using
//! [`from_params`] and friends.
//!
//! A parameter file names the law in its `controller_name` key, alongside the
//! shared velocity limits and any gains specific to the law:
//!
//! ```toml
//! controller_name = "DifferentialRotationP"
//! maximum_linear_velocity = 1.0
//! maximum_angular_velocity = 1.0
//! p_gain = 2.0
//! ```
//!
//! Keys which the law doesn't use are ignored.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod rotation_p;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

// External
use log::info;
use serde::{Deserialize, Serialize};

// Internal
use crate::{loc::Pose, path::Path};
use util::params;

pub use rotation_p::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Value the tracked distance to goal is reset to when a path is attached, so
/// that a goal reached check never sees a stale small value from a previous
/// path.
pub const FAR_DISTANCE_TO_GOAL: f64 = 100_000.0;

/// Parameter key holding the name of the control law.
pub const CONTROLLER_NAME_KEY: &str = "controller_name";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A velocity command for a differential drive robot.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityCmd {
    /// Forward velocity
    pub lin_vel_ms: f64,

    /// Angular velocity about the vertical axis, positive counter clockwise
    pub ang_vel_rads: f64,
}

/// Parameters shared by all control laws.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLawParams {
    /// Maximum linear velocity the law may demand
    pub maximum_linear_velocity: f64,

    /// Maximum angular velocity the law may demand
    pub maximum_angular_velocity: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The control laws which can be built by name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlLawKind {
    /// Rotation on the spot towards the heading of the first path pose
    DifferentialRotationP,
}

/// Potential errors that can occur while building or running a control law.
#[derive(Debug, thiserror::Error)]
pub enum ControlLawError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("The parameters contain no `{}` string", CONTROLLER_NAME_KEY)]
    MissingControllerName,

    #[error(
        "Undefined controller {0:?}, please specify a valid controller name (one of {:?})",
        ControlLawKind::NAMES
    )]
    UnknownControlLaw(String),

    #[error("Invalid parameters for the control law: {0}")]
    InvalidParams(toml::de::Error),

    #[error(
        "Velocity limits must be positive and finite, found linear {0} m/s and angular {1} rad/s"
    )]
    InvalidLimits(f64, f64),

    #[error("The gain `{0}` must be finite, found {1}")]
    InvalidGain(&'static str, f64),

    /// A command was requested before any path was attached.
    #[error("No path has been set")]
    NoPath,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Interface shared by all control laws.
///
/// A control law holds a shared reference to its path, which it never modifies.
/// It owns a small amount of scratch state, in particular the distance
/// remaining to its goal, which is updated by every call to
/// [`ControlLaw::compute_command_vector`] so it can be inspected afterwards.
pub trait ControlLaw: Send + std::fmt::Debug {
    /// The name of the law, as used in parameter files.
    fn name(&self) -> &'static str;

    /// The velocity limits of the law.
    fn params(&self) -> &ControlLawParams;

    /// The attached path, if any.
    fn path(&self) -> Option<&Arc<Path>>;

    /// Replace the attached path.
    ///
    /// This also resets the tracked distance to goal to
    /// [`FAR_DISTANCE_TO_GOAL`].
    fn update_path(&mut self, new_path: Arc<Path>);

    /// Compute the velocity command for the given robot state.
    ///
    /// The command never exceeds the law's maximum velocities. As a side effect
    /// the tracked distance to goal is updated.
    fn compute_command_vector(&mut self, state: &Pose) -> Result<VelocityCmd, ControlLawError>;

    /// The distance remaining to the goal as of the last command.
    ///
    /// The units depend on the law, for rotation laws this is an angle.
    fn distance_to_goal(&self) -> f64;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ControlLawParams {
    /// Check that the limits are usable.
    pub fn validate(&self) -> Result<(), ControlLawError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;

        if valid(self.maximum_linear_velocity) && valid(self.maximum_angular_velocity) {
            Ok(())
        } else {
            Err(ControlLawError::InvalidLimits(
                self.maximum_linear_velocity,
                self.maximum_angular_velocity,
            ))
        }
    }
}

impl ControlLawKind {
    /// Names of all the laws, in the order of the enum.
    pub const NAMES: [&'static str; 1] = ["DifferentialRotationP"];

    /// Get the kind of law from its parameter file name.
    pub fn from_name(name: &str) -> Result<Self, ControlLawError> {
        match name {
            "DifferentialRotationP" => Ok(ControlLawKind::DifferentialRotationP),
            _ => Err(ControlLawError::UnknownControlLaw(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControlLawKind::DifferentialRotationP => Self::NAMES[0],
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build a control law from a parameter table, choosing the law from its
/// `controller_name` key.
pub fn from_params(params: toml::Value) -> Result<Box<dyn ControlLaw>, ControlLawError> {
    let name = params
        .get(CONTROLLER_NAME_KEY)
        .and_then(|v| v.as_str())
        .ok_or(ControlLawError::MissingControllerName)?;

    let kind = ControlLawKind::from_name(name)?;

    let law: Box<dyn ControlLaw> = match kind {
        ControlLawKind::DifferentialRotationP => {
            let law_params: RotationPParams = params
                .try_into()
                .map_err(ControlLawError::InvalidParams)?;
            Box::new(DifferentialRotationP::new(law_params)?)
        }
    };

    info!("Built {} control law", law.name());

    Ok(law)
}

/// Build a control law from the contents of a TOML parameter file.
pub fn from_param_str(params_str: &str) -> Result<Box<dyn ControlLaw>, ControlLawError> {
    let params: toml::Value = params::from_str(params_str)
        .map_err(ControlLawError::ParamLoadError)?;

    from_params(params)
}

/// Build a control law from a parameter file, relative to the params directory.
pub fn load(param_file_path: &str) -> Result<Box<dyn ControlLaw>, ControlLawError> {
    let params: toml::Value = params::load(param_file_path)
        .map_err(ControlLawError::ParamLoadError)?;

    from_params(params)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const ROTATION_P_PARAMS: &str = r#"
        controller_name = "DifferentialRotationP"
        maximum_linear_velocity = 1.0
        maximum_angular_velocity = 1.5
        p_gain = 2.0
        some_other_key = "ignored"
    "#;

    #[test]
    fn test_build_by_name() {
        let law = from_param_str(ROTATION_P_PARAMS).unwrap();
        assert_eq!(law.name(), "DifferentialRotationP");
        assert_eq!(law.params().maximum_angular_velocity, 1.5);
        assert!(law.path().is_none());
        assert!(law.distance_to_goal() >= FAR_DISTANCE_TO_GOAL);
    }

    #[test]
    fn test_unknown_name() {
        let res = from_param_str(
            r#"
            controller_name = "DifferentialOrthogonalExponential"
            maximum_linear_velocity = 1.0
            maximum_angular_velocity = 1.0
            "#,
        );
        match res {
            Err(ControlLawError::UnknownControlLaw(name)) => {
                assert_eq!(name, "DifferentialOrthogonalExponential")
            }
            r => panic!("Expected unknown control law error, got {:?}", r),
        }
    }

    #[test]
    fn test_missing_keys() {
        assert!(matches!(
            from_param_str("maximum_linear_velocity = 1.0\n"),
            Err(ControlLawError::MissingControllerName)
        ));
        assert!(matches!(
            from_param_str("controller_name = 3\n"),
            Err(ControlLawError::MissingControllerName)
        ));

        // No gain
        assert!(matches!(
            from_param_str(
                r#"
                controller_name = "DifferentialRotationP"
                maximum_linear_velocity = 1.0
                maximum_angular_velocity = 1.0
                "#
            ),
            Err(ControlLawError::InvalidParams(_))
        ));

        // No limits
        assert!(matches!(
            from_param_str(
                r#"
                controller_name = "DifferentialRotationP"
                p_gain = 1.0
                "#
            ),
            Err(ControlLawError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_invalid_limits() {
        assert!(matches!(
            from_param_str(
                r#"
                controller_name = "DifferentialRotationP"
                maximum_linear_velocity = 1.0
                maximum_angular_velocity = -1.0
                p_gain = 1.0
                "#
            ),
            Err(ControlLawError::InvalidLimits(_, _))
        ));
    }

    #[test]
    fn test_laws_on_threads_share_path() {
        let mut path = Path::new(vec![
            Pose::new_planar(0.0, 0.0, 0.5),
            Pose::new_planar(1.0, 0.0, 0.0),
            Pose::new_planar(2.0, 0.5, 0.0),
        ])
        .unwrap();
        path.compute_metrics(1.0).unwrap();
        let path = Arc::new(path);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let mut law = from_param_str(ROTATION_P_PARAMS).unwrap();
                law.update_path(path.clone());

                std::thread::spawn(move || {
                    let state = Pose::new_planar(0.0, 0.0, 0.1 * i as f64);
                    let cmd = law.compute_command_vector(&state).unwrap();
                    let proj = law
                        .path()
                        .unwrap()
                        .compute_orthogonal_projection(&state.position2(), 1, 1.0);
                    (cmd, proj.indices)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let (cmd, indices) = handle.join().unwrap();
            assert!((cmd.ang_vel_rads - 2.0 * (0.5 - 0.1 * i as f64)).abs() < 1e-9);
            assert_eq!(indices, vec![0]);
        }
    }

    #[test]
    fn test_kind_names() {
        for name in ControlLawKind::NAMES.iter() {
            assert_eq!(ControlLawKind::from_name(name).unwrap().name(), *name);
        }
    }
}
