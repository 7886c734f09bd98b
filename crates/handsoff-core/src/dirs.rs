//! State directory layout.
//!
//! Everything handsoff persists lives under a single home root
//! (`$HANDSOFF_HOME`, falling back to the current directory):
//!
//! ```text
//! <home>/.tmp/
//! ├── hooked-sessions/              (session records + decision logs)
//! │   ├── <session-id>.json
//! │   └── by-issue/<issue>.json     (issue -> session index)
//! ├── workers/                      (one status record per worker slot)
//! │   └── worker-<id>.status
//! └── logs/                         (server log files)
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the home root.
pub const HOME_ENV: &str = "HANDSOFF_HOME";

/// Root of all handsoff state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandsoffHome {
    root: PathBuf,
}

impl HandsoffHome {
    /// Resolve the home root from `$HANDSOFF_HOME` or the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `$HANDSOFF_HOME` is unset and the current
    /// directory cannot be determined.
    pub fn resolve() -> io::Result<Self> {
        Self::resolve_from(std::env::var(HOME_ENV).ok().as_deref())
    }

    /// Resolve the home root from an explicit override value.
    ///
    /// An empty override is treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the current directory
    /// cannot be determined.
    pub fn resolve_from(override_root: Option<&str>) -> io::Result<Self> {
        match override_root {
            Some(root) if !root.is_empty() => Ok(Self::from_path(root)),
            _ => Ok(Self::from_path(std::env::current_dir()?)),
        }
    }

    /// Create from an explicit path (useful for testing).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The home root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch state directory (`<home>/.tmp`).
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".tmp")
    }

    /// Hooked session records and decision logs.
    #[must_use]
    pub fn session_dir(&self) -> PathBuf {
        self.state_dir().join("hooked-sessions")
    }

    /// Worker slot status records.
    #[must_use]
    pub fn workers_dir(&self) -> PathBuf {
        self.state_dir().join("workers")
    }

    /// Server log files.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }
}
