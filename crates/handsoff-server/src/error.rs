//! Error types for the worker pool.

use handsoff_core::WorkError;
use thiserror::Error;

/// Errors raised while managing worker slots.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A slot record lacks a valid `state` line.
    #[error("slot {slot} record is corrupt: {reason}")]
    SlotCorruption {
        /// Slot id.
        slot: usize,
        /// What was wrong with the record.
        reason: String,
    },

    /// Starting a worker failed after its slot was claimed.
    #[error("failed to start {job}: {source}")]
    SpawnFailure {
        /// The job that was being started.
        job: String,
        /// Underlying spawner error.
        #[source]
        source: WorkError,
    },

    /// A slot record could not be read or written.
    #[error("slot record I/O error at {path}: {source}")]
    Io {
        /// Path of the record.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
