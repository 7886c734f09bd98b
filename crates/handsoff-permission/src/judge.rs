//! The judge-model tier.
//!
//! Rule-silent operations can be shown to a secondary model together with
//! the most recent transcript entry. Only the leading token of its answer
//! is read; anything other than a tier name counts as `ask`.

use std::path::Path;

use handsoff_config::JudgeConfig;
use handsoff_core::{BoundedCall, CallOutcome, OperationKind, Tier, truncate_chars};
use tracing::{debug, info, warn};

use crate::error::{PermissionError, PermissionResult};

/// Longest transcript excerpt included in a prompt.
pub const TRANSCRIPT_EXCERPT_MAX_CHARS: usize = 4000;

const TIER_NAME: &str = "judge model";

/// Build the prompt sent to the judge.
#[must_use]
pub fn build_prompt(kind: &OperationKind, raw_target: &str, transcript_excerpt: &str) -> String {
    format!(
        "Evaluate this coding agent tool call for automatic permission in hands-off mode.

Tool: {kind}
Target: {raw_target}

Risk categories:
- allow: Read-only operations, file search, git status, safe builds, test runs
- deny: Destructive ops (rm -rf, git reset --hard), secrets access, sudo, force push
- ask: Unclear intent, external API writes, untrusted script execution

Context (last transcript entry):
{transcript_excerpt}

Reply with allow, deny, or ask as the first word. Brief reasoning is optional."
    )
}

/// Read the last line of a JSONL transcript, bounded in length.
///
/// # Errors
///
/// Returns [`PermissionError::EscalationTransport`] when the transcript
/// cannot be read or is empty.
pub async fn transcript_excerpt(path: &Path) -> PermissionResult<String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PermissionError::EscalationTransport {
            tier: TIER_NAME,
            reason: format!("cannot read transcript {}: {e}", path.display()),
        })?;
    let last = content
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| PermissionError::EscalationTransport {
            tier: TIER_NAME,
            reason: format!("transcript {} is empty", path.display()),
        })?;
    Ok(truncate_chars(last, TRANSCRIPT_EXCERPT_MAX_CHARS).to_string())
}

/// Asks an external model for a verdict.
#[derive(Debug, Clone)]
pub struct Judge {
    config: JudgeConfig,
}

impl Judge {
    /// Create a judge from configuration.
    #[must_use]
    pub fn new(config: JudgeConfig) -> Self {
        Self { config }
    }

    /// A judge that is never consulted.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(JudgeConfig::default())
    }

    /// Whether the judge will be consulted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Judge one operation.
    ///
    /// Returns `ask` without running anything when the judge is disabled.
    ///
    /// # Errors
    ///
    /// Returns an escalation error when the transcript is missing, the call
    /// fails or times out. Callers treat every error as `ask`.
    pub async fn evaluate(
        &self,
        kind: &OperationKind,
        raw_target: &str,
        transcript: Option<&Path>,
    ) -> PermissionResult<Tier> {
        if !self.config.enabled {
            debug!(tool = %kind, "Judge disabled");
            return Ok(Tier::Ask);
        }

        let path = transcript.ok_or_else(|| PermissionError::EscalationTransport {
            tier: TIER_NAME,
            reason: "no transcript provided".to_string(),
        })?;
        let excerpt = transcript_excerpt(path).await?;

        let call = BoundedCall::new(&self.config.command, self.config.timeout())
            .args(&self.config.args)
            .stdin(build_prompt(kind, raw_target, &excerpt));

        match call.run().await {
            CallOutcome::Success { stdout } => {
                let verdict = stdout.trim().to_lowercase();
                let tier = Tier::from_leading_token(&verdict).unwrap_or_else(|| {
                    warn!(
                        tool = %kind,
                        response = truncate_chars(&verdict, 50),
                        "Judge answered without a tier"
                    );
                    Tier::Ask
                });
                info!(tool = %kind, tier = %tier, "Judge verdict");
                Ok(tier)
            },
            CallOutcome::Timeout { after } => Err(PermissionError::EscalationTimeout {
                tier: TIER_NAME,
                after_secs: after.as_secs(),
            }),
            CallOutcome::ProcessError { error, .. } => Err(PermissionError::EscalationTransport {
                tier: TIER_NAME,
                reason: error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_operation_and_context() {
        let prompt = build_prompt(&OperationKind::Bash, "make deploy", "{\"role\":\"user\"}");
        assert!(prompt.contains("Tool: Bash\nTarget: make deploy\n"));
        assert!(prompt.contains("Context (last transcript entry):\n{\"role\":\"user\"}\n"));
        assert!(prompt.ends_with("Brief reasoning is optional."));
    }

    #[tokio::test]
    async fn excerpt_is_last_non_empty_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.jsonl");
        std::fs::write(&path, "{\"n\":1}\n{\"n\":2}\n\n").unwrap();
        assert_eq!(transcript_excerpt(&path).await.unwrap(), "{\"n\":2}");
    }

    #[tokio::test]
    async fn excerpt_is_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.jsonl");
        std::fs::write(&path, "y".repeat(10_000)).unwrap();
        let excerpt = transcript_excerpt(&path).await.unwrap();
        assert_eq!(excerpt.len(), TRANSCRIPT_EXCERPT_MAX_CHARS);
    }

    #[tokio::test]
    async fn empty_transcript_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.jsonl");
        std::fs::write(&path, "").unwrap();
        assert!(transcript_excerpt(&path).await.is_err());
    }

    #[tokio::test]
    async fn disabled_judge_asks_without_transcript() {
        let judge = Judge::disabled();
        let tier = judge.evaluate(&OperationKind::Bash, "ls", None).await.unwrap();
        assert_eq!(tier, Tier::Ask);
    }

    #[tokio::test]
    async fn enabled_judge_needs_a_transcript() {
        let judge = Judge::new(JudgeConfig {
            enabled: true,
            ..JudgeConfig::default()
        });
        let result = judge.evaluate(&OperationKind::Bash, "ls", None).await;
        assert!(matches!(
            result,
            Err(PermissionError::EscalationTransport { .. })
        ));
    }
}
