//! Common imports for the permission cascade.
//!
//! ```
//! use handsoff_permission::prelude::*;
//! ```

pub use crate::{
    DecisionRequest, DecisionResult, HookInput, HookOutput, Judge, PermissionError,
    PermissionGate, PermissionResult, PermissionRule, RuleCache, RuleTable,
};
