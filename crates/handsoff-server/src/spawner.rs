//! Worker spawner backed by the `wt` worktree helper.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use handsoff_config::ServerConfig;
use handsoff_core::{BoundedCall, SpawnedWorker, WorkResult, WorkerSpawner};
use regex::Regex;
use tracing::{debug, info};

use crate::command::run_checked;

static PID_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PID[:\s]+(\d+)").expect("invalid regex"));

/// The worker pid announced in `wt` output, from the first line carrying one.
#[must_use]
pub fn parse_pid(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .filter_map(|line| PID_LINE.captures(line))
        .find_map(|caps| caps.get(1)?.as_str().parse().ok())
}

/// Starts workers with `wt spawn` and `wt rebase`.
#[derive(Debug, Clone)]
pub struct WtSpawner {
    program: String,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl WtSpawner {
    /// Run `program`, bounding each call by `timeout`.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            working_dir: None,
        }
    }

    /// A spawner using the configured helper and bound.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.wt_command.clone(), config.spawn_timeout())
    }

    /// Run the helper from `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn call<I: IntoIterator<Item = String>>(&self, args: I) -> BoundedCall {
        let call = BoundedCall::new(&self.program, self.timeout).args(args);
        match &self.working_dir {
            Some(dir) => call.current_dir(dir),
            None => call,
        }
    }

    async fn start(&self, subcommand: &str, number: u64) -> WorkResult<SpawnedWorker> {
        let call = self.call([
            subcommand.to_string(),
            number.to_string(),
            "--headless".to_string(),
        ]);
        let stdout = run_checked(&call).await?;
        let pid = parse_pid(&stdout);
        if pid.is_none() {
            debug!(command = %call.display(), "No worker pid in output");
        }
        info!(command = %call.display(), pid = ?pid, "Worker started");
        Ok(SpawnedWorker { pid })
    }
}

#[async_trait]
impl WorkerSpawner for WtSpawner {
    async fn worktree_exists(&self, issue: u64) -> bool {
        self.call(["pathto".to_string(), issue.to_string()])
            .run()
            .await
            .is_success()
    }

    async fn spawn(&self, issue: u64) -> WorkResult<SpawnedWorker> {
        self.start("spawn", issue).await
    }

    async fn rebase(&self, pr: u64) -> WorkResult<SpawnedWorker> {
        self.start("rebase", pr).await
    }
}
