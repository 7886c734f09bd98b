//! Error types for the collaborator traits defined in this crate.

use thiserror::Error;

/// Errors raised by a [`MessagingBackend`](crate::MessagingBackend).
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The backend could not be reached or the request failed in transit.
    #[error("messaging transport error: {0}")]
    Transport(String),

    /// The backend answered but rejected the request.
    #[error("messaging API error: {0}")]
    Api(String),

    /// The backend answered with a payload that could not be decoded.
    #[error("malformed messaging response: {0}")]
    Decode(String),
}

/// Result type for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Errors raised by a [`WorkTracker`](crate::WorkTracker) or
/// [`WorkerSpawner`](crate::WorkerSpawner).
#[derive(Debug, Error)]
pub enum WorkError {
    /// An external command failed or exited non-zero.
    #[error("{command} failed: {reason}")]
    Command {
        /// The command that was run.
        command: String,
        /// Why it failed.
        reason: String,
    },

    /// An external command exceeded its time bound.
    #[error("{command} timed out after {timeout_secs}s")]
    Timeout {
        /// The command that was run.
        command: String,
        /// The bound that was exceeded.
        timeout_secs: u64,
    },

    /// Tracker output could not be decoded.
    #[error("could not parse tracker output: {0}")]
    Parse(String),
}

/// Result type for tracker and spawner operations.
pub type WorkResult<T> = Result<T, WorkError>;
