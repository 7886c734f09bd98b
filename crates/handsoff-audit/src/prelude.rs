//! Prelude module - commonly used types for convenient import.
//!
//! Use `use handsoff_audit::prelude::*;` to import all essential types.

pub use crate::{AuditError, AuditResult, DecisionEntry, DecisionLog};
