//! Mock implementations of the collaborator traits.
//!
//! All mocks use `std::sync::Mutex` internally so builder methods work
//! without a runtime, and clone cheaply so a test can keep a handle for
//! assertions after moving one into the code under test.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use handsoff_core::{
    IncomingMessage, MessagingBackend, MessagingError, MessagingResult, RepairItem,
    SpawnedWorker, Update, WorkError, WorkItem, WorkResult, WorkTracker, WorkerSpawner,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MockMessenger
// ---------------------------------------------------------------------------

/// A message captured by [`MockMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Target chat.
    pub chat_id: String,
    /// Message body.
    pub text: String,
    /// Message replied to, if any.
    pub reply_to: Option<i64>,
    /// Id assigned by the mock.
    pub message_id: i64,
}

#[derive(Debug, Default)]
struct MessengerState {
    /// Updates currently visible to `get_updates`.
    visible: Vec<Update>,
    /// Batches of updates; each send releases the next batch.
    after_send: VecDeque<Vec<Update>>,
    sent: Vec<SentMessage>,
    offsets: Vec<i64>,
    failing_sends: usize,
    failing_polls: usize,
    failing_reply_polls: usize,
}

/// In-memory messaging backend with Telegram-like update semantics.
///
/// A negative offset returns the most recent updates; a non-negative offset
/// returns every update whose id is at least the offset. An empty poll
/// sleeps for the requested long-poll wait, so tests driven by a paused
/// tokio clock see time advance exactly as they would against the real API.
#[derive(Debug, Clone)]
pub struct MockMessenger {
    state: Arc<Mutex<MessengerState>>,
    next_update_id: Arc<AtomicI64>,
    next_message_id: Arc<AtomicI64>,
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMessenger {
    /// Create an empty messenger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MessengerState::default())),
            next_update_id: Arc::new(AtomicI64::new(1000)),
            next_message_id: Arc::new(AtomicI64::new(1)),
        }
    }

    fn make_update(&self, from_id: Option<i64>, text: &str) -> Update {
        Update {
            update_id: self.next_update_id.fetch_add(1, Ordering::SeqCst),
            message: Some(IncomingMessage {
                message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
                from_id,
                text: Some(text.to_string()),
            }),
        }
    }

    /// Add an update that is already pending before anything is sent.
    #[must_use]
    pub fn with_backlog(self, from_id: i64, text: &str) -> Self {
        let update = self.make_update(Some(from_id), text);
        lock(&self.state).visible.push(update);
        self
    }

    /// Add an update that arrives once the next message has been sent.
    ///
    /// Replies are released in queue order, one per sent message.
    #[must_use]
    pub fn with_reply(self, from_id: i64, text: &str) -> Self {
        let update = self.make_update(Some(from_id), text);
        lock(&self.state).after_send.push_back(vec![update]);
        self
    }

    /// Add a batch of replies that all arrive together once a message is sent.
    #[must_use]
    pub fn with_replies(self, replies: &[(i64, &str)]) -> Self {
        let batch: Vec<Update> = replies
            .iter()
            .map(|(from, text)| self.make_update(Some(*from), text))
            .collect();
        lock(&self.state).after_send.push_back(batch);
        self
    }

    /// Make the next `count` sends fail with a transport error.
    #[must_use]
    pub fn with_failing_sends(self, count: usize) -> Self {
        lock(&self.state).failing_sends = count;
        self
    }

    /// Make the next `count` polls fail with a transport error.
    #[must_use]
    pub fn with_failing_polls(self, count: usize) -> Self {
        lock(&self.state).failing_polls = count;
        self
    }

    /// Make the next `count` polls at a non-negative offset fail.
    ///
    /// Offset lookups (negative offsets) still succeed, so a request can be
    /// posted before its reply polls start failing.
    #[must_use]
    pub fn with_failing_reply_polls(self, count: usize) -> Self {
        lock(&self.state).failing_reply_polls = count;
        self
    }

    /// Every message sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.state).sent.clone()
    }

    /// Text of every message sent so far.
    #[must_use]
    pub fn sent_texts(&self) -> Vec<String> {
        lock(&self.state).sent.iter().map(|m| m.text.clone()).collect()
    }

    /// Offsets passed to `get_updates`, in call order.
    #[must_use]
    pub fn polled_offsets(&self) -> Vec<i64> {
        lock(&self.state).offsets.clone()
    }
}

#[async_trait]
impl MessagingBackend for MockMessenger {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> MessagingResult<i64> {
        let mut state = lock(&self.state);
        if state.failing_sends > 0 {
            state.failing_sends = state.failing_sends.saturating_sub(1);
            return Err(MessagingError::Transport("mock send failure".to_string()));
        }

        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        state.sent.push(SentMessage {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            reply_to,
            message_id,
        });
        if let Some(batch) = state.after_send.pop_front() {
            state.visible.extend(batch);
        }
        Ok(message_id)
    }

    async fn get_updates(
        &self,
        offset: i64,
        limit: Option<u32>,
        wait: Duration,
    ) -> MessagingResult<Vec<Update>> {
        let result = {
            let mut state = lock(&self.state);
            state.offsets.push(offset);
            if state.failing_polls > 0 {
                state.failing_polls = state.failing_polls.saturating_sub(1);
                return Err(MessagingError::Transport("mock poll failure".to_string()));
            }
            if offset >= 0 && state.failing_reply_polls > 0 {
                state.failing_reply_polls = state.failing_reply_polls.saturating_sub(1);
                return Err(MessagingError::Transport("mock poll failure".to_string()));
            }

            let mut matching: Vec<Update> = if offset < 0 {
                let take = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);
                let skip = state.visible.len().saturating_sub(take);
                state.visible.iter().skip(skip).cloned().collect()
            } else {
                state
                    .visible
                    .iter()
                    .filter(|u| u.update_id >= offset)
                    .cloned()
                    .collect()
            };
            if let Some(limit) = limit {
                matching.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            }
            matching
        };

        if result.is_empty() && !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// MockTracker
// ---------------------------------------------------------------------------

/// Scripted work tracker.
#[derive(Debug, Clone, Default)]
pub struct MockTracker {
    ready: Arc<Mutex<Vec<WorkItem>>>,
    repair: Arc<Mutex<Vec<RepairItem>>>,
    failing: Arc<Mutex<bool>>,
    calls: Arc<AtomicUsize>,
}

impl MockTracker {
    /// Create a tracker with no work.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ready issue.
    #[must_use]
    pub fn with_ready(self, issue: u64, title: &str) -> Self {
        lock(&self.ready).push(WorkItem::new(issue, title));
        self
    }

    /// Add a pull request needing repair.
    #[must_use]
    pub fn with_repair(self, pr: u64, issue: Option<u64>) -> Self {
        lock(&self.repair).push(RepairItem { pr, issue });
        self
    }

    /// Make every query fail.
    #[must_use]
    pub fn failing(self) -> Self {
        *lock(&self.failing) = true;
        self
    }

    /// Replace the ready list.
    pub fn set_ready(&self, items: Vec<WorkItem>) {
        *lock(&self.ready) = items;
    }

    /// Number of queries served.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, command: &str) -> WorkResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *lock(&self.failing) {
            return Err(WorkError::Command {
                command: command.to_string(),
                reason: "mock tracker failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WorkTracker for MockTracker {
    async fn ready_items(&self) -> WorkResult<Vec<WorkItem>> {
        self.check("ready_items")?;
        Ok(lock(&self.ready).clone())
    }

    async fn repair_items(&self) -> WorkResult<Vec<RepairItem>> {
        self.check("repair_items")?;
        Ok(lock(&self.repair).clone())
    }
}

// ---------------------------------------------------------------------------
// MockSpawner
// ---------------------------------------------------------------------------

/// Scripted worker spawner.
///
/// Spawns succeed with the configured pid unless a failure was queued.
/// Every successful spawn also marks the issue's worktree as existing.
#[derive(Debug, Clone, Default)]
pub struct MockSpawner {
    worktrees: Arc<Mutex<HashSet<u64>>>,
    failures: Arc<Mutex<VecDeque<String>>>,
    pid: Arc<Mutex<Option<u32>>>,
    spawned: Arc<Mutex<Vec<u64>>>,
    rebased: Arc<Mutex<Vec<u64>>>,
}

impl MockSpawner {
    /// Create a spawner whose workers report no pid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `pid` for every successful spawn.
    #[must_use]
    pub fn with_pid(self, pid: u32) -> Self {
        *lock(&self.pid) = Some(pid);
        self
    }

    /// Mark a worktree as already existing.
    #[must_use]
    pub fn with_worktree(self, issue: u64) -> Self {
        lock(&self.worktrees).insert(issue);
        self
    }

    /// Make the next spawn or rebase fail with `reason`.
    #[must_use]
    pub fn with_failure(self, reason: &str) -> Self {
        lock(&self.failures).push_back(reason.to_string());
        self
    }

    /// Issues spawned so far, in order.
    #[must_use]
    pub fn spawned(&self) -> Vec<u64> {
        lock(&self.spawned).clone()
    }

    /// Pull requests rebased so far, in order.
    #[must_use]
    pub fn rebased(&self) -> Vec<u64> {
        lock(&self.rebased).clone()
    }

    fn next_result(&self, command: String) -> WorkResult<SpawnedWorker> {
        if let Some(reason) = lock(&self.failures).pop_front() {
            return Err(WorkError::Command { command, reason });
        }
        Ok(SpawnedWorker {
            pid: *lock(&self.pid),
        })
    }
}

#[async_trait]
impl WorkerSpawner for MockSpawner {
    async fn worktree_exists(&self, issue: u64) -> bool {
        lock(&self.worktrees).contains(&issue)
    }

    async fn spawn(&self, issue: u64) -> WorkResult<SpawnedWorker> {
        let worker = self.next_result(format!("spawn {issue}"))?;
        lock(&self.spawned).push(issue);
        lock(&self.worktrees).insert(issue);
        Ok(worker)
    }

    async fn rebase(&self, pr: u64) -> WorkResult<SpawnedWorker> {
        let worker = self.next_result(format!("rebase {pr}"))?;
        lock(&self.rebased).push(pr);
        Ok(worker)
    }
}
