//! Prelude module - commonly used types for convenient import.
//!
//! Use `use handsoff_core::prelude::*;` to import all essential types.

// Decision vocabulary
pub use crate::{DecisionSource, OperationKind, RuleSource, Tier};

// Errors
pub use crate::{MessagingError, MessagingResult, WorkError, WorkResult};

// Directories and sessions
pub use crate::{HandsoffHome, SessionState, SessionStore, Workflow};

// External calls and collaborators
pub use crate::{
    BoundedCall, CallOutcome, IncomingMessage, MessagingBackend, RepairItem, SpawnedWorker,
    Update, WorkItem, WorkTracker, WorkerSpawner,
};
