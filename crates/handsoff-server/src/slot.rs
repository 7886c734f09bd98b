//! The flat `key=value` slot record.
//!
//! ```text
//! state=BUSY
//! issue=42
//! pid=31337
//! ```

use std::fmt;
use std::fmt::Write as _;

use crate::error::{SchedulerError, SchedulerResult};

/// Whether a slot is running a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Available for assignment.
    Free,
    /// Assigned to an issue.
    Busy,
}

impl SlotState {
    /// The record spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Busy => "BUSY",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "FREE" => Some(Self::Free),
            "BUSY" => Some(Self::Busy),
            _ => None,
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRecord {
    /// Slot state.
    pub state: SlotState,
    /// Issue the slot was claimed for.
    pub issue: Option<u64>,
    /// Worker process, once started.
    pub pid: Option<u32>,
}

impl SlotRecord {
    /// An idle slot.
    #[must_use]
    pub fn free() -> Self {
        Self {
            state: SlotState::Free,
            issue: None,
            pid: None,
        }
    }

    /// A slot claimed for `issue` whose worker has not started yet.
    #[must_use]
    pub fn busy(issue: u64) -> Self {
        Self {
            state: SlotState::Busy,
            issue: Some(issue),
            pid: None,
        }
    }

    /// Attach the worker pid.
    #[must_use]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Whether the slot is claimed.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state == SlotState::Busy
    }

    /// Parse the record of `slot`.
    ///
    /// Unknown keys are ignored, as are `issue` and `pid` values that are
    /// not numbers.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::SlotCorruption`] when there is no `state`
    /// line or it names an unknown state.
    pub fn parse(slot: usize, text: &str) -> SchedulerResult<Self> {
        let mut state = None;
        let mut issue = None;
        let mut pid = None;

        for line in text.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "state" => {
                    state = Some(SlotState::parse(value).ok_or_else(|| {
                        SchedulerError::SlotCorruption {
                            slot,
                            reason: format!("unknown state '{value}'"),
                        }
                    })?);
                },
                "issue" => issue = value.parse().ok(),
                "pid" => pid = value.parse().ok(),
                _ => {},
            }
        }

        let state = state.ok_or_else(|| SchedulerError::SlotCorruption {
            slot,
            reason: "missing state".to_string(),
        })?;
        Ok(Self { state, issue, pid })
    }

    /// Render the record file contents.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("state={}\n", self.state);
        if let Some(issue) = self.issue {
            let _ = writeln!(out, "issue={issue}");
        }
        if let Some(pid) = self.pid {
            let _ = writeln!(out, "pid={pid}");
        }
        out
    }
}

impl fmt::Display for SlotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(issue) = self.issue {
            write!(f, " issue=#{issue}")?;
        }
        if let Some(pid) = self.pid {
            write!(f, " pid={pid}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_record_renders_every_field() {
        let record = SlotRecord::busy(42).with_pid(Some(31337));
        assert_eq!(record.render(), "state=BUSY\nissue=42\npid=31337\n");
        assert_eq!(SlotRecord::parse(0, &record.render()).unwrap(), record);
    }

    #[test]
    fn free_record_has_only_state() {
        assert_eq!(SlotRecord::free().render(), "state=FREE\n");
    }

    #[test]
    fn malformed_numbers_are_dropped() {
        let record = SlotRecord::parse(1, "state=BUSY\nissue=abc\npid=\n").unwrap();
        assert!(record.is_busy());
        assert_eq!(record.issue, None);
        assert_eq!(record.pid, None);
    }

    #[test]
    fn unknown_keys_and_blank_lines_are_ignored() {
        let record = SlotRecord::parse(1, "\nowner=me\nstate=FREE\n\n").unwrap();
        assert_eq!(record, SlotRecord::free());
    }

    #[test]
    fn missing_or_unknown_state_is_corruption() {
        for text in ["", "issue=3\npid=4\n", "state=SLEEPING\n", "garbage"] {
            assert!(
                matches!(
                    SlotRecord::parse(2, text),
                    Err(SchedulerError::SlotCorruption { slot: 2, .. })
                ),
                "{text:?}"
            );
        }
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(SlotRecord::busy(7).with_pid(Some(9)).to_string(), "BUSY issue=#7 pid=9");
        assert_eq!(SlotRecord::free().to_string(), "FREE");
    }
}
