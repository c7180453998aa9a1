//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable ({}) is not set", crate::host::SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "params" directory under the software
/// root.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError> 
where
    P: DeserializeOwned
{
    // Get the params dir
    let mut path = crate::host::get_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    load_from_path(path)
}

/// Load a parameter file from an explicit path, which is not resolved against
/// the software root.
pub fn load_from_path<P, Q>(path: Q) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    Q: AsRef<Path>
{
    // Load the file into a string
    let params_str = read_to_string(path)
        .map_err(LoadError::FileLoadError)?;

    from_str(params_str.as_str())
}

/// Parse parameters from a TOML string.
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct TestParams {
        gain: f64,
        name: String,
    }

    #[test]
    fn test_from_str() {
        let p: TestParams = from_str("gain = 2.5\nname = \"p\"\nunused = 1\n").unwrap();
        assert_eq!(p.gain, 2.5);
        assert_eq!(p.name, "p");

        match from_str::<TestParams>("gain = 2.5\n") {
            Err(LoadError::DeserialiseError(_)) => (),
            r => panic!("Expected deserialise error, got {:?}", r)
        }
    }

    #[test]
    fn test_missing_file() {
        match load_from_path::<TestParams, _>("/this/file/does/not/exist.toml") {
            Err(LoadError::FileLoadError(_)) => (),
            r => panic!("Expected file load error, got {:?}", r)
        }
    }
}
