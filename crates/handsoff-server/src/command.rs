//! Bounded `gh`/`wt` invocations mapped onto [`WorkError`].

use handsoff_core::{BoundedCall, CallOutcome, WorkError, WorkResult};

/// Run `call`, returning its stdout on success.
pub(crate) async fn run_checked(call: &BoundedCall) -> WorkResult<String> {
    match call.run().await {
        CallOutcome::Success { stdout } => Ok(stdout),
        CallOutcome::Timeout { after } => Err(WorkError::Timeout {
            command: call.display(),
            timeout_secs: after.as_secs(),
        }),
        CallOutcome::ProcessError { error, stderr, .. } => Err(WorkError::Command {
            command: call.display(),
            reason: stderr
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(error),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn stderr_is_preferred_as_reason() {
        let call = BoundedCall::new("sh", Duration::from_secs(5))
            .args(["-c", "echo 'no such issue' >&2; exit 1"]);
        match run_checked(&call).await {
            Err(WorkError::Command { reason, .. }) => assert_eq!(reason, "no such issue"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let call = BoundedCall::new("sleep", Duration::from_millis(100)).arg("5");
        assert!(matches!(
            run_checked(&call).await,
            Err(WorkError::Timeout { .. })
        ));
    }
}
