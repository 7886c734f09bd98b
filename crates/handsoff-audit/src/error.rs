//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur while appending to the decision trail.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A log file could not be opened or written.
    #[error("failed to write decision log {path}: {source}")]
    Io {
        /// The file that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
