//! Bounded external calls.
//!
//! Every subprocess handsoff runs (the judge model, `gh`, `wt`) goes through
//! [`BoundedCall`]: the call carries an explicit timeout and always returns a
//! typed [`CallOutcome`] instead of an error, so callers decide what a timeout
//! or a process failure means for them.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// The result of a bounded external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The process exited successfully.
    Success {
        /// Captured standard output.
        stdout: String,
    },
    /// The process did not finish within the bound and was killed.
    Timeout {
        /// The bound that was exceeded.
        after: Duration,
    },
    /// The process could not be started or exited non-zero.
    ProcessError {
        /// Description of the failure.
        error: String,
        /// Exit code, when the process ran to completion.
        exit_code: Option<i32>,
        /// Captured standard error, when the process ran to completion.
        stderr: Option<String>,
    },
}

impl CallOutcome {
    /// Whether the call succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Standard output of a successful call.
    #[must_use]
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Success { stdout } => Some(stdout),
            _ => None,
        }
    }
}

/// A subprocess invocation with an explicit time bound.
#[derive(Debug, Clone)]
pub struct BoundedCall {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl BoundedCall {
    /// Prepare a call to `program` bounded by `timeout`.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            working_dir: None,
            timeout,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed `input` on standard input, then close it.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Run in `dir` instead of the current directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Human-readable command line, for logs and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// The configured bound.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the call to completion or until the bound expires.
    pub async fn run(&self) -> CallOutcome {
        debug!(command = %self.display(), timeout_secs = self.timeout.as_secs(), "Running bounded call");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = match timeout(self.timeout, async {
            let mut child = cmd.spawn()?;

            // Write the input, then close stdin so the child sees EOF.
            if let (Some(input), Some(mut pipe)) = (self.stdin.as_deref(), child.stdin.take()) {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    warn!(command = %self.display(), error = %e, "Failed to write call input");
                } else if let Err(e) = pipe.shutdown().await {
                    warn!(command = %self.display(), error = %e, "Failed to close call input");
                }
            }

            child.wait_with_output().await
        })
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return CallOutcome::ProcessError {
                    error: format!("failed to execute {}: {e}", self.program),
                    exit_code: None,
                    stderr: None,
                };
            },
            Err(_) => {
                warn!(command = %self.display(), timeout_secs = self.timeout.as_secs(), "Bounded call timed out");
                return CallOutcome::Timeout {
                    after: self.timeout,
                };
            },
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let exit_code = output.status.code();
            warn!(
                command = %self.display(),
                exit_code = ?exit_code,
                stderr = %stderr.trim(),
                "Bounded call failed"
            );
            return CallOutcome::ProcessError {
                error: format!(
                    "{} exited with code {}",
                    self.program,
                    exit_code.map_or_else(|| "none".to_string(), |c| c.to_string())
                ),
                exit_code,
                stderr: Some(stderr),
            };
        }

        CallOutcome::Success { stdout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_call_captures_stdout() {
        let outcome = BoundedCall::new("echo", Duration::from_secs(5))
            .arg("hello")
            .run()
            .await;
        assert_eq!(outcome.stdout().map(str::trim), Some("hello"));
    }

    #[tokio::test]
    async fn stdin_is_delivered_and_closed() {
        let outcome = BoundedCall::new("cat", Duration::from_secs(5))
            .stdin("piped input")
            .run()
            .await;
        assert_eq!(outcome.stdout(), Some("piped input"));
    }

    #[tokio::test]
    async fn child_ignoring_stdin_still_completes() {
        let input = "x".repeat(4_194_304);
        let outcome = BoundedCall::new("sh", Duration::from_secs(5))
            .args(["-c", "echo done"])
            .stdin(input)
            .run()
            .await;
        assert_eq!(outcome.stdout().map(str::trim), Some("done"));
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let outcome = BoundedCall::new("sleep", Duration::from_millis(100))
            .arg("10")
            .run()
            .await;
        assert!(matches!(outcome, CallOutcome::Timeout { .. }));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_process_error() {
        let outcome = BoundedCall::new("sh", Duration::from_secs(5))
            .args(["-c", "echo oops >&2; exit 3"])
            .run()
            .await;
        match outcome {
            CallOutcome::ProcessError {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.unwrap_or_default().contains("oops"));
            },
            other => panic!("expected process error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_process_error() {
        let outcome = BoundedCall::new("definitely-not-a-real-binary-xyz", Duration::from_secs(5))
            .run()
            .await;
        assert!(matches!(
            outcome,
            CallOutcome::ProcessError {
                exit_code: None,
                ..
            }
        ));
    }

    #[test]
    fn display_joins_program_and_args() {
        let call = BoundedCall::new("wt", Duration::from_secs(1)).args(["spawn", "12"]);
        assert_eq!(call.display(), "wt spawn 12");
        assert_eq!(BoundedCall::new("gh", Duration::from_secs(1)).display(), "gh");
    }
}
