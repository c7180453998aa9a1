//! Session management
//!
//! A session is one execution of one of the executables. Each session gets its
//! own timestamped directory holding the log file and any data archived during
//! the run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use log::debug;
use serde::Serialize;
use std::fs;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A chrono format string which diplays a timestamp. See
/// https://docs.rs/chrono/0.4.11/chrono/format/strftime/index.html for more
/// information.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A struct storing information about the current session
#[derive(Clone, Debug)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable ({}) is not set", crate::host::SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error(
        "Cannot initialise the session epoch, have you already initialised the \
         session? (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time, did you forget to initialise the session?")]
    CannotGetEpoch,

    #[error("Cannot write the archive file {0:?}: {1}")]
    CannotWriteFile(PathBuf, std::io::Error),

    #[error("Cannot serialise data for the archive file {0:?}: {1}")]
    CannotSerialise(PathBuf, serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session within the given directory.
    ///
    /// This will create a new session directory named `{exec_name}_{timestamp}`
    /// inside `sessions_dir`, which is relative to the software root.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        // Get the root directory
        let mut root = crate::host::get_sw_root().map_err(|_| SessionError::SwRootNotSet)?;
        root.push(sessions_dir);

        Self::new_in(exec_name, root)
    }

    /// Start a new session inside an explicit directory.
    pub fn new_in<P: AsRef<Path>>(exec_name: &str, sessions_dir: P) -> Result<Self, SessionError> {
        // Set the session epoch
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        // Format the session epoch as a timestamp
        let timestamp = match SESSION_EPOCH.get() {
            Some(e) => e.format(TIMESTAMP_FORMAT),
            None => return Err(SessionError::CannotGetEpoch),
        };

        // Create the session path
        let mut path = sessions_dir.as_ref().to_path_buf();
        path.push(format!("{}_{}", exec_name, timestamp));

        // Create the directory and the archive dir within it
        let arch_path = path.join("arch");
        fs::create_dir_all(&arch_path).map_err(SessionError::CannotCreateDir)?;

        // Create the log file path
        let log_file_path = path.join(format!("{}.log", exec_name));

        Ok(Session {
            session_root: path,
            arch_root: arch_path,
            log_file_path,
        })
    }

    /// Save the given data as pretty printed JSON to the given archive-relative path.
    ///
    /// Parent directories are created as needed and existing files are overwritten.
    pub fn save_json<P: AsRef<Path>, T: Serialize>(
        &self,
        path: P,
        data: &T,
    ) -> Result<PathBuf, SessionError> {
        let full_path = self.arch_root.join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SessionError::CannotWriteFile(full_path.clone(), e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&full_path)
            .map_err(|e| SessionError::CannotWriteFile(full_path.clone(), e))?;

        serde_json::to_writer_pretty(&file, data)
            .map_err(|e| SessionError::CannotSerialise(full_path.clone(), e))?;

        debug!("Saved archive file {:?}", full_path);

        Ok(full_path)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// If the session has not been started yet `NaN` is returned.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => time::duration_to_seconds(Utc::now() - *e).unwrap_or(std::f64::NAN),
        None => std::f64::NAN,
    }
}

/// Return a reference to the session's epoch, if the session has been started.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

#[cfg(test)]
mod test {
    use super::*;

    // Only one session can be started per process, so everything is checked in a single test
    #[test]
    fn test_session() {
        let dir = std::env::temp_dir().join("ctrl_sw_session_test");
        let session = Session::new_in("test_exec", &dir).unwrap();

        assert!(session.arch_root.is_dir());
        assert!(session.session_root.starts_with(&dir));
        assert_eq!(session.log_file_path.file_name().unwrap(), "test_exec.log");
        assert!(get_epoch().is_some());
        assert!(get_elapsed_seconds() >= 0.0);

        let saved = session.save_json("nested/data.json", &vec![1.0, 2.5]).unwrap();
        let read: Vec<f64> = serde_json::from_str(&fs::read_to_string(saved).unwrap()).unwrap();
        assert_eq!(read, vec![1.0, 2.5]);

        // The epoch can't be initialised twice
        assert!(matches!(
            Session::new_in("test_exec", &dir),
            Err(SessionError::CannotInitEpoch(_))
        ));
    }
}
