//! Fixed-size worker pool backed by one status file per slot.
//!
//! Records are replaced atomically (write to a temporary file in the same
//! directory, then rename), so a reader never sees a partial record. A
//! single server process is assumed to drive the pool.

use std::io::Write;
use std::path::{Path, PathBuf};

use handsoff_core::SessionStore;
use handsoff_telegram::{Notifier, format};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::slot::{SlotRecord, SlotState};

/// Whether `pid` names a running process.
///
/// A process owned by another user still counts as running.
#[must_use]
pub fn process_alive(pid: u32) -> bool {
    // 0 and negative values address process groups.
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// The worker pool.
#[derive(Debug, Clone)]
pub struct Scheduler {
    dir: PathBuf,
    num_slots: usize,
}

impl Scheduler {
    /// A pool of `num_slots` slots recorded under `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, num_slots: usize) -> Self {
        Self {
            dir: dir.into(),
            num_slots,
        }
    }

    /// Directory holding the slot records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of slots.
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Path of the record for `slot`.
    #[must_use]
    pub fn record_path(&self, slot: usize) -> PathBuf {
        self.dir.join(format!("worker-{slot}.status"))
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SchedulerError + '_ {
        move |source| SchedulerError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create the directory and rewrite every missing or corrupt record as
    /// `FREE`. Valid records are left alone.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or a record cannot be written.
    pub fn init(&self) -> SchedulerResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;
        for slot in 0..self.num_slots {
            match self.read(slot) {
                Ok(Some(_)) => {},
                Ok(None) => self.write(slot, &SlotRecord::free())?,
                Err(e @ SchedulerError::SlotCorruption { .. }) => {
                    warn!(slot, error = %e, "Resetting corrupt slot record");
                    self.write(slot, &SlotRecord::free())?;
                },
                Err(e) => return Err(e),
            }
        }
        info!(slots = self.num_slots, dir = %self.dir.display(), "Worker pool ready");
        Ok(())
    }

    /// `None` when the record does not exist.
    fn read(&self, slot: usize) -> SchedulerResult<Option<SlotRecord>> {
        let path = self.record_path(slot);
        match std::fs::read_to_string(&path) {
            Ok(text) => SlotRecord::parse(slot, &text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path)(e)),
        }
    }

    /// Load the record of `slot`.
    ///
    /// A missing record reads as `FREE`. A corrupt one reads as `FREE` and
    /// is rewritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be read or rewritten.
    pub fn load(&self, slot: usize) -> SchedulerResult<SlotRecord> {
        match self.read(slot) {
            Ok(record) => Ok(record.unwrap_or_else(SlotRecord::free)),
            Err(e @ SchedulerError::SlotCorruption { .. }) => {
                warn!(slot, error = %e, "Treating corrupt slot record as free");
                let record = SlotRecord::free();
                self.write(slot, &record)?;
                Ok(record)
            },
            Err(e) => Err(e),
        }
    }

    /// Replace the record of `slot` atomically.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be written.
    pub fn write(&self, slot: usize, record: &SlotRecord) -> SchedulerResult<()> {
        let path = self.record_path(slot);
        std::fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(Self::io_error(&path))?;
        tmp.write_all(record.render().as_bytes())
            .map_err(Self::io_error(&path))?;
        tmp.persist(&path)
            .map_err(|e| Self::io_error(&path)(e.error))?;

        debug!(slot, record = %record, "Slot record written");
        Ok(())
    }

    /// Every slot with its record, in slot order.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a record cannot be read.
    pub fn slots(&self) -> SchedulerResult<Vec<(usize, SlotRecord)>> {
        (0..self.num_slots)
            .map(|slot| self.load(slot).map(|record| (slot, record)))
            .collect()
    }

    /// The lowest-numbered `FREE` slot, or `None` when all are busy.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a record cannot be read.
    pub fn acquire_free_slot(&self) -> SchedulerResult<Option<usize>> {
        for slot in 0..self.num_slots {
            if self.load(slot)?.state == SlotState::Free {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Mark `slot` busy for `issue`, before its worker is started.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be written.
    pub fn claim(&self, slot: usize, issue: u64) -> SchedulerResult<()> {
        self.write(slot, &SlotRecord::busy(issue))
    }

    /// Record the worker started in `slot`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be written.
    pub fn record_pid(&self, slot: usize, issue: u64, pid: Option<u32>) -> SchedulerResult<()> {
        self.write(slot, &SlotRecord::busy(issue).with_pid(pid))
    }

    /// Return `slot` to the pool.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be written.
    pub fn release(&self, slot: usize) -> SchedulerResult<()> {
        self.write(slot, &SlotRecord::free())
    }

    /// Whether `slot` is free, busy without a recorded pid, or busy with a
    /// running worker.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be read.
    pub fn liveness(&self, slot: usize) -> SchedulerResult<bool> {
        let record = self.load(slot)?;
        Ok(match (record.state, record.pid) {
            (SlotState::Free, _) | (SlotState::Busy, None) => true,
            (SlotState::Busy, Some(pid)) => process_alive(pid),
        })
    }

    /// Whether some busy slot is assigned to `issue`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a record cannot be read.
    pub fn holds_issue(&self, issue: u64) -> SchedulerResult<bool> {
        Ok(self
            .slots()?
            .iter()
            .any(|(_, record)| record.is_busy() && record.issue == Some(issue)))
    }

    /// Free every slot whose worker has exited.
    ///
    /// When the exited worker's session is recorded as done, a completion
    /// notice is sent and the issue's session index removed. Without a
    /// notifier the index is removed right away; with one, only once the
    /// notice was delivered. Returns the freed slots.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a record cannot be read or written.
    pub async fn reap_dead(
        &self,
        sessions: &SessionStore,
        notifier: Option<&Notifier>,
        issue_url: impl Fn(u64) -> Option<String>,
    ) -> SchedulerResult<Vec<usize>> {
        let mut freed = Vec::new();
        for slot in 0..self.num_slots {
            if self.liveness(slot)? {
                continue;
            }
            let record = self.load(slot)?;
            info!(slot, pid = ?record.pid, issue = ?record.issue, "Worker exited, freeing slot");

            if let Some(issue) = record.issue
                && sessions.state_for_issue(issue).is_some_and(|s| s.is_done())
            {
                let delivered = match notifier {
                    Some(notifier) => {
                        let url = issue_url(issue);
                        notifier
                            .notify(&format::worker_completion(issue, slot, url.as_deref()))
                            .await
                    },
                    None => true,
                };
                if delivered {
                    sessions.remove_issue_index(issue);
                }
            }

            self.release(slot)?;
            freed.push(slot);
        }
        Ok(freed)
    }

    /// Claim the first free slot for `issue`.
    ///
    /// Returns `None` when every slot is busy. The slot stays claimed only
    /// if the lease is committed; dropping it releases the slot.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a record cannot be read or written.
    pub fn lease(&self, issue: u64) -> SchedulerResult<Option<SlotLease<'_>>> {
        let Some(slot) = self.acquire_free_slot()? else {
            return Ok(None);
        };
        self.claim(slot, issue)?;
        debug!(slot, issue, "Slot claimed");
        Ok(Some(SlotLease {
            scheduler: self,
            slot,
            issue,
            armed: true,
        }))
    }
}

/// A claimed slot whose worker has not started yet.
#[must_use = "dropping a lease releases the slot"]
#[derive(Debug)]
pub struct SlotLease<'a> {
    scheduler: &'a Scheduler,
    slot: usize,
    issue: u64,
    armed: bool,
}

impl SlotLease<'_> {
    /// The claimed slot.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The issue the slot was claimed for.
    #[must_use]
    pub fn issue(&self) -> u64 {
        self.issue
    }

    /// Keep the slot, recording the started worker. Returns the slot id.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the pid cannot be written. The slot stays
    /// claimed `BUSY` without a pid, since its worker is already running.
    pub fn commit(mut self, pid: Option<u32>) -> SchedulerResult<usize> {
        self.keep(pid)
    }

    fn keep(&mut self, pid: Option<u32>) -> SchedulerResult<usize> {
        self.armed = false;
        self.scheduler.record_pid(self.slot, self.issue, pid)?;
        Ok(self.slot)
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.scheduler.release(self.slot) {
            Ok(()) => debug!(slot = self.slot, issue = self.issue, "Slot released"),
            Err(e) => error!(
                slot = self.slot,
                issue = self.issue,
                error = %e,
                "Failed to release slot"
            ),
        }
    }
}
