//! The periodic poll loop.
//!
//! Each cycle reaps exited workers, starts workers for ready issues, then
//! starts conflict repair for blocked pull requests. A failure on one item
//! is logged and the rest of the cycle continues.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use handsoff_config::TrackerConfig;
use handsoff_core::{SessionStore, SpawnedWorker, WorkItem, WorkResult, WorkTracker, WorkerSpawner};
use handsoff_telegram::{Notifier, StartupInfo, format};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::scheduler::Scheduler;

/// Resolves on the first SIGINT or SIGTERM.
///
/// The handlers are installed before this returns, so a signal that arrives
/// while a cycle is running is not lost.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    })
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Slots freed from exited workers.
    pub reaped: usize,
    /// Workers started for ready issues.
    pub spawned: usize,
    /// Conflict repairs started.
    pub repaired: usize,
    /// Items skipped as already in progress or unresolvable.
    pub skipped: usize,
    /// Items whose start failed.
    pub failed: usize,
    /// Whether work was left for the next cycle because every slot was busy.
    pub deferred: bool,
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Implement { issue: u64 },
    Repair { pr: u64, issue: u64 },
}

impl Job {
    fn issue(self) -> u64 {
        match self {
            Self::Implement { issue } | Self::Repair { issue, .. } => issue,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implement { issue } => write!(f, "issue #{issue}"),
            Self::Repair { pr, issue } => write!(f, "repair of PR #{pr} (issue #{issue})"),
        }
    }
}

enum Dispatch {
    Started { slot: Option<usize> },
    Deferred,
    Failed,
}

fn bump(counter: &mut usize) {
    *counter = counter.saturating_add(1);
}

/// Drives the tracker, the spawner and the worker pool.
pub struct PollLoop {
    tracker: Arc<dyn WorkTracker>,
    spawner: Arc<dyn WorkerSpawner>,
    sessions: SessionStore,
    scheduler: Option<Scheduler>,
    notifier: Option<Notifier>,
    links: TrackerConfig,
    period: Duration,
}

impl fmt::Debug for PollLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollLoop")
            .field("scheduler", &self.scheduler)
            .field("notifier", &self.notifier)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl PollLoop {
    /// A loop without a worker pool: every ready item is started at once.
    #[must_use]
    pub fn new(
        tracker: Arc<dyn WorkTracker>,
        spawner: Arc<dyn WorkerSpawner>,
        sessions: SessionStore,
        period: Duration,
    ) -> Self {
        Self {
            tracker,
            spawner,
            sessions,
            scheduler: None,
            notifier: None,
            links: TrackerConfig::default(),
            period,
        }
    }

    /// Bound concurrent workers by `scheduler`.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Announce starts and completions through `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Link notifications to issues of the configured repository.
    #[must_use]
    pub fn with_issue_links(mut self, tracker: TrackerConfig) -> Self {
        self.links = tracker;
        self
    }

    /// The worker pool, if bounded.
    #[must_use]
    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    /// Time between cycles.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Prepare the pool: reset corrupt records, then free exited workers.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the slot records cannot be written.
    pub async fn prepare(&self) -> SchedulerResult<()> {
        let Some(scheduler) = &self.scheduler else {
            return Ok(());
        };
        scheduler.init()?;
        let freed = self.reap(scheduler).await?;
        if !freed.is_empty() {
            info!(slots = ?freed, "Freed slots of exited workers");
        }
        Ok(())
    }

    /// Send the startup notice. Returns whether it was delivered.
    pub async fn announce(&self, info: &StartupInfo) -> bool {
        match &self.notifier {
            Some(notifier) => notifier.notify(&format::server_started(info)).await,
            None => {
                debug!("No notifier configured, skipping startup notice");
                false
            },
        }
    }

    async fn reap(&self, scheduler: &Scheduler) -> SchedulerResult<Vec<usize>> {
        scheduler
            .reap_dead(&self.sessions, self.notifier.as_ref(), |issue| {
                self.links.issue_url(issue)
            })
            .await
    }

    /// Run one cycle. Never fails; problems are logged and counted.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        if let Some(scheduler) = &self.scheduler {
            match self.reap(scheduler).await {
                Ok(freed) => report.reaped = freed.len(),
                Err(e) => error!(error = %e, "Failed to reap exited workers"),
            }
        }

        match self.tracker.ready_items().await {
            Ok(items) => self.implement(items, &mut report).await,
            Err(e) => error!(error = %e, "Failed to list ready issues"),
        }

        match self.tracker.repair_items().await {
            Ok(items) => {
                for item in items {
                    let Some(issue) = item.issue else {
                        warn!(pr = item.pr, "Cannot resolve issue of pull request, skipping repair");
                        bump(&mut report.skipped);
                        continue;
                    };
                    if !self.repair(item.pr, issue, &mut report).await {
                        break;
                    }
                }
            },
            Err(e) => error!(error = %e, "Failed to list pull requests needing repair"),
        }

        report
    }

    async fn implement(&self, items: Vec<WorkItem>, report: &mut CycleReport) {
        for item in items {
            if self.spawner.worktree_exists(item.issue).await {
                debug!(issue = item.issue, "Worktree exists, skipping");
                bump(&mut report.skipped);
                continue;
            }

            match self.dispatch(Job::Implement { issue: item.issue }).await {
                Dispatch::Started { slot } => {
                    bump(&mut report.spawned);
                    if let (Some(slot), Some(notifier)) = (slot, &self.notifier) {
                        let url = self.links.issue_url(item.issue);
                        notifier
                            .notify(&format::worker_assignment(
                                item.issue,
                                &item.title,
                                slot,
                                url.as_deref(),
                            ))
                            .await;
                    }
                },
                Dispatch::Deferred => {
                    report.deferred = true;
                    break;
                },
                Dispatch::Failed => bump(&mut report.failed),
            }
        }
    }

    /// Returns `false` when the pass should stop for this cycle.
    async fn repair(&self, pr: u64, issue: u64, report: &mut CycleReport) -> bool {
        if !self.spawner.worktree_exists(issue).await {
            info!(pr, issue, "No worktree for pull request, skipping repair");
            bump(&mut report.skipped);
            return true;
        }
        if let Some(scheduler) = &self.scheduler {
            match scheduler.holds_issue(issue) {
                Ok(true) => {
                    debug!(pr, issue, "Issue already has a worker, skipping repair");
                    bump(&mut report.skipped);
                    return true;
                },
                Ok(false) => {},
                Err(e) => {
                    error!(pr, issue, error = %e, "Failed to read worker pool");
                    bump(&mut report.failed);
                    return true;
                },
            }
        }

        match self.dispatch(Job::Repair { pr, issue }).await {
            Dispatch::Started { .. } => bump(&mut report.repaired),
            Dispatch::Deferred => {
                report.deferred = true;
                return false;
            },
            Dispatch::Failed => bump(&mut report.failed),
        }
        true
    }

    async fn start(&self, job: Job) -> WorkResult<SpawnedWorker> {
        match job {
            Job::Implement { issue } => self.spawner.spawn(issue).await,
            Job::Repair { pr, .. } => self.spawner.rebase(pr).await,
        }
    }

    async fn dispatch(&self, job: Job) -> Dispatch {
        let Some(scheduler) = &self.scheduler else {
            return match self.start(job).await {
                Ok(_) => {
                    info!(%job, "Worker started");
                    Dispatch::Started { slot: None }
                },
                Err(source) => {
                    let e = SchedulerError::SpawnFailure {
                        job: job.to_string(),
                        source,
                    };
                    error!(error = %e, "Worker start failed");
                    Dispatch::Failed
                },
            };
        };

        let lease = match scheduler.lease(job.issue()) {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                info!(
                    slots = scheduler.num_slots(),
                    %job,
                    "All workers busy, deferring to next cycle"
                );
                return Dispatch::Deferred;
            },
            Err(e) => {
                error!(%job, error = %e, "Failed to claim a worker slot");
                return Dispatch::Failed;
            },
        };
        let slot = lease.slot();

        match self.start(job).await {
            Ok(worker) => match lease.commit(worker.pid) {
                Ok(slot) => {
                    info!(%job, slot, pid = ?worker.pid, "Worker assigned");
                    Dispatch::Started { slot: Some(slot) }
                },
                Err(e) => {
                    error!(%job, slot, error = %e, "Failed to record worker pid, slot kept busy");
                    Dispatch::Started { slot: Some(slot) }
                },
            },
            Err(source) => {
                drop(lease);
                let e = SchedulerError::SpawnFailure {
                    job: job.to_string(),
                    source,
                };
                error!(slot, error = %e, "Worker start failed, slot released");
                Dispatch::Failed
            },
        }
    }

    /// Run cycles every period until `shutdown` resolves. Shutdown is
    /// honored between cycles.
    pub async fn run_until<F: Future<Output = ()>>(&self, shutdown: F) {
        tokio::pin!(shutdown);
        info!(period_secs = self.period.as_secs(), "Poll loop started");
        loop {
            let report = self.run_cycle().await;
            info!(
                reaped = report.reaped,
                spawned = report.spawned,
                repaired = report.repaired,
                skipped = report.skipped,
                failed = report.failed,
                deferred = report.deferred,
                "Poll cycle finished"
            );

            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(self.period) => {},
            }
        }
        info!("Poll loop stopped");
    }
}
