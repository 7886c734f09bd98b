//! Handsoff Core - Foundation types and traits shared by the permission gate
//! and the worker-pool server.
//!
//! This crate provides:
//! - The decision vocabulary ([`OperationKind`], [`Tier`], [`DecisionSource`], [`RuleSource`])
//! - State directory resolution ([`HandsoffHome`])
//! - Read-only access to hooked session records ([`SessionStore`])
//! - The bounded external call used for every subprocess ([`BoundedCall`])
//! - Collaborator traits: [`MessagingBackend`], [`WorkTracker`], [`WorkerSpawner`]

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod dirs;
pub mod error;
pub mod exec;
pub mod messaging;
pub mod session;
pub mod types;
pub mod utils;
pub mod work;

pub use dirs::HandsoffHome;
pub use error::{MessagingError, MessagingResult, WorkError, WorkResult};
pub use exec::{BoundedCall, CallOutcome};
pub use messaging::{IncomingMessage, MessagingBackend, Update};
pub use session::{SessionState, SessionStore, Workflow};
pub use types::{DecisionSource, OperationKind, RuleSource, Tier};
pub use utils::truncate_chars;
pub use work::{RepairItem, SpawnedWorker, WorkItem, WorkTracker, WorkerSpawner};
