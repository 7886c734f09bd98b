//! Faults raised inside the decision cascade.
//!
//! None of these ever cross the gate boundary: [`PermissionGate::decide`]
//! turns every one of them into an `ask` decision.
//!
//! [`PermissionGate::decide`]: crate::PermissionGate::decide

/// Errors raised by the tiers of the cascade.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// The hook payload could not be understood.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A rule pattern failed to compile.
    #[error("bad pattern {pattern:?}: {reason}")]
    PatternFault {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// An escalation tier ran out of time.
    #[error("{tier} timed out after {after_secs}s")]
    EscalationTimeout {
        /// Tier that timed out.
        tier: &'static str,
        /// The bound that was exceeded.
        after_secs: u64,
    },

    /// An escalation tier could not reach its backend.
    #[error("{tier} unavailable: {reason}")]
    EscalationTransport {
        /// Tier that failed.
        tier: &'static str,
        /// What went wrong.
        reason: String,
    },
}

/// Result type for cascade operations.
pub type PermissionResult<T> = Result<T, PermissionError>;
