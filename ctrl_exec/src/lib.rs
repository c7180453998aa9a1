//! # Trajectory control library.
//!
//! Provides the geometry of reference paths and the control laws which track
//! them, for use by the executables in this crate and by other crates in the
//! workspace.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control laws - convert the robot state and path geometry into velocity commands
pub mod ctrl;

/// Localisation types - poses of the robot and of path waypoints
pub mod loc;

/// Path module - reference paths and their geometric descriptors
pub mod path;
