//! Handsoff Server - the worker pool and the loop that feeds it.
//!
//! The [`PollLoop`] periodically asks a [`WorkTracker`] for ready issues
//! and for pull requests blocked on conflicts, and starts a worker for
//! each through a [`WorkerSpawner`]. When bounded, a [`Scheduler`] keeps
//! one status file per worker slot:
//!
//! ```text
//! <home>/.tmp/workers/worker-0.status   state=BUSY / issue=42 / pid=31337
//! <home>/.tmp/workers/worker-1.status   state=FREE
//! ```
//!
//! A slot is claimed before its worker is started and released again if
//! the start fails; [`SlotLease`] enforces that pairing.
//!
//! [`WorkTracker`]: handsoff_core::WorkTracker
//! [`WorkerSpawner`]: handsoff_core::WorkerSpawner

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod command;
pub mod error;
pub mod poll;
pub mod scheduler;
pub mod slot;
pub mod spawner;
pub mod tracker;

pub use error::{SchedulerError, SchedulerResult};
pub use poll::{CycleReport, PollLoop, shutdown_signal};
pub use scheduler::{Scheduler, SlotLease, process_alive};
pub use slot::{SlotRecord, SlotState};
pub use spawner::WtSpawner;
pub use tracker::GhTracker;

/// This machine's host name, for the startup notice.
#[must_use]
pub fn host_name() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
