//! Work tracker and worker spawner abstractions used by the poll loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkResult;

/// An issue that is ready to be worked on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Issue number.
    pub issue: u64,
    /// Issue title, used in notifications.
    #[serde(default)]
    pub title: String,
}

impl WorkItem {
    /// Create a work item.
    #[must_use]
    pub fn new(issue: u64, title: impl Into<String>) -> Self {
        Self {
            issue,
            title: title.into(),
        }
    }
}

/// A pull request blocked on merge conflicts that needs automatic repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairItem {
    /// Pull request number.
    pub pr: u64,
    /// Issue the pull request implements, when it could be resolved.
    pub issue: Option<u64>,
}

/// A successfully started worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnedWorker {
    /// Process id of the worker, when the spawner reported one.
    pub pid: Option<u32>,
}

/// Read-only view of the external work tracker.
#[async_trait]
pub trait WorkTracker: Send + Sync {
    /// Issues that are ready for implementation.
    async fn ready_items(&self) -> WorkResult<Vec<WorkItem>>;

    /// Pull requests that need conflict repair.
    async fn repair_items(&self) -> WorkResult<Vec<RepairItem>>;
}

/// Launches long-lived worker processes. The caller never waits on them.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Whether work state (a worktree) already exists for `issue`.
    async fn worktree_exists(&self, issue: u64) -> bool;

    /// Start implementation work for `issue`.
    async fn spawn(&self, issue: u64) -> WorkResult<SpawnedWorker>;

    /// Start conflict repair for pull request `pr`.
    async fn rebase(&self, pr: u64) -> WorkResult<SpawnedWorker>;
}
