//! Common imports for running the worker pool.
//!
//! ```
//! use handsoff_server::prelude::*;
//! ```

pub use crate::{
    CycleReport, GhTracker, PollLoop, Scheduler, SchedulerError, SchedulerResult, SlotLease,
    SlotRecord, SlotState, WtSpawner,
};
