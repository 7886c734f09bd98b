//! Handsoff Permission - the decision cascade that gates agent operations.
//!
//! Every requested operation is classified as `allow`, `deny` or `ask` by
//! escalating tiers of authority:
//!
//! 1. [`RuleTable`]: builtin and configured regex rules, deny before ask
//!    before allow
//! 2. [`Judge`]: an external model, consulted only when no rule applies
//! 3. Human approval over a chat backend, for anything still `ask`
//!
//! [`PermissionGate::decide`] always returns a decision. Faults resolve to
//! `ask`, never to `allow`.
//!
//! # Example
//!
//! ```
//! use handsoff_core::{DecisionSource, OperationKind, Tier};
//! use handsoff_permission::{DecisionRequest, PermissionGate, RuleCache, RuleTable};
//!
//! # tokio::runtime::Builder::new_current_thread()
//! #     .build()
//! #     .unwrap()
//! #     .block_on(async {
//! let gate = PermissionGate::new(RuleCache::with_table(RuleTable::builtin()));
//! let request = DecisionRequest::new(OperationKind::Bash, "FOO=1 git status", "session");
//!
//! let result = gate.decide(&request).await;
//! assert_eq!(result.tier, Tier::Allow);
//! assert_eq!(result.source, DecisionSource::Rules);
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod extract;
pub mod gate;
pub mod hook;
pub mod judge;
pub mod normalize;
pub mod rules;

pub use error::{PermissionError, PermissionResult};
pub use extract::extract_target;
pub use gate::{DecisionRequest, DecisionResult, PermissionGate};
pub use hook::{HookInput, HookOutput, handle_hook};
pub use judge::Judge;
pub use normalize::normalize_command;
pub use rules::{PermissionRule, RuleCache, RuleMatch, RuleTable};
