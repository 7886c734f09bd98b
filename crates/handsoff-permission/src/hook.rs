//! The hook boundary: one JSON request in, one JSON decision out.

use std::path::PathBuf;

use handsoff_core::{OperationKind, Tier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{PermissionError, PermissionResult};
use crate::gate::{DecisionRequest, DecisionResult, PermissionGate};

/// Event name echoed back to the host.
pub const HOOK_EVENT_NAME: &str = "PreToolUse";

/// A tool-use request as the host sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    /// Name of the requested tool.
    pub tool_name: String,
    /// Requesting session.
    #[serde(default = "unknown_session")]
    pub session_id: String,
    /// Tool-specific payload.
    #[serde(default)]
    pub tool_input: Value,
    /// JSONL transcript of the session.
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
}

fn unknown_session() -> String {
    "unknown".to_string()
}

impl HookInput {
    /// Parse the raw request.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::MalformedRequest`] if `raw` is not a
    /// request object.
    pub fn parse(raw: &str) -> PermissionResult<Self> {
        serde_json::from_str(raw).map_err(|e| PermissionError::MalformedRequest(e.to_string()))
    }

    /// Turn the request into a cascade input.
    #[must_use]
    pub fn into_request(self) -> DecisionRequest {
        let kind = OperationKind::from_tool_name(&self.tool_name);
        let request = DecisionRequest::from_payload(kind, &self.tool_input, self.session_id);
        match self.transcript_path {
            Some(path) => request.with_transcript(path),
            None => request,
        }
    }
}

/// The decision written back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOutput {
    /// Hook-specific payload.
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookDecision,
}

/// The decision itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDecision {
    /// Always [`HOOK_EVENT_NAME`].
    pub hook_event_name: String,
    /// The tier.
    pub permission_decision: Tier,
}

impl HookOutput {
    /// Wrap a tier.
    #[must_use]
    pub fn new(tier: Tier) -> Self {
        Self {
            hook_specific_output: HookDecision {
                hook_event_name: HOOK_EVENT_NAME.to_string(),
                permission_decision: tier,
            },
        }
    }

    /// The decided tier.
    #[must_use]
    pub fn tier(&self) -> Tier {
        self.hook_specific_output.permission_decision
    }

    /// Render as a single JSON line.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"hookSpecificOutput":{{"hookEventName":"{HOOK_EVENT_NAME}","permissionDecision":"ask"}}}}"#
            )
        })
    }
}

impl From<DecisionResult> for HookOutput {
    fn from(result: DecisionResult) -> Self {
        Self::new(result.tier)
    }
}

/// Decide a raw hook request. A request that cannot be parsed is answered
/// with `ask`.
pub async fn handle_hook(gate: &PermissionGate, raw: &str) -> HookOutput {
    match HookInput::parse(raw) {
        Ok(input) => gate.decide(&input.into_request()).await.into(),
        Err(e) => {
            warn!(error = %e, "Unreadable hook request, answering ask");
            HookOutput::new(Tier::Ask)
        },
    }
}
