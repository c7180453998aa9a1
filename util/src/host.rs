//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Environment variable pointing at the root of the software checkout, which
/// holds the `params` and `sessions` directories.
pub const SW_ROOT_ENV_VAR: &str = "CTRL_SW_ROOT";

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
