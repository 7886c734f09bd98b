//! Handsoff Audit - the append-only decision trail.
//!
//! Every final permission decision can be recorded as one line in a text
//! file chosen by the authority that produced it:
//!
//! | Source | File |
//! |--------|------|
//! | rules | `tool-rules.txt` |
//! | judge-model | `tool-judge-determined.txt` |
//! | human | `tool-human-determined.txt` |
//! | error-fallback | `tool-error-fallback.txt` |
//!
//! Lines carry both the session's workflow (read from the session store)
//! and the raw, un-normalized target, so the trail keeps full fidelity
//! even though rule matching ran on the normalized form.
//!
//! # Example
//!
//! ```
//! use handsoff_audit::DecisionLog;
//! use handsoff_core::{DecisionSource, OperationKind, Tier};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let log = DecisionLog::new(dir.path());
//! log.record("abc123", &OperationKind::Bash, "git status", Tier::Allow, DecisionSource::Rules)
//!     .unwrap();
//! assert!(dir.path().join("tool-rules.txt").exists());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod error;
mod log;

pub use entry::DecisionEntry;
pub use error::{AuditError, AuditResult};
pub use log::DecisionLog;
