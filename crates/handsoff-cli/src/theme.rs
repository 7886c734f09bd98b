//! CLI theme and styling.

use colored::Colorize;
use handsoff_server::{SlotRecord, SlotState};

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a slot state, padded to a fixed width.
    pub(crate) fn slot_state(state: SlotState) -> String {
        let padded = format!("{:<6}", state.as_str());
        match state {
            SlotState::Free => padded.green().to_string(),
            SlotState::Busy => padded.yellow().to_string(),
        }
    }

    /// Format one slot row.
    pub(crate) fn slot_row(slot: usize, record: &SlotRecord, alive: Option<bool>) -> String {
        let issue = record
            .issue
            .map_or_else(|| "-".to_string(), |n| format!("#{n}"));
        let pid = record.pid.map_or_else(|| "-".to_string(), |p| p.to_string());
        let liveness = match alive {
            Some(true) => "running".green().to_string(),
            Some(false) => "exited".red().to_string(),
            None => String::new(),
        };
        format!(
            "{:>4}  {}  {:>8}  {:>8}  {}",
            slot,
            Self::slot_state(record.state),
            issue,
            pid,
            liveness
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_row_shows_dashes_for_free_slot() {
        colored::control::set_override(false);
        let row = Theme::slot_row(2, &SlotRecord::free(), None);
        assert!(row.starts_with("   2  FREE"));
        assert_eq!(row.matches('-').count(), 2);
    }

    #[test]
    fn slot_row_shows_issue_and_pid() {
        colored::control::set_override(false);
        let record = SlotRecord::busy(42).with_pid(Some(31337));
        let row = Theme::slot_row(0, &record, Some(false));
        assert!(row.contains("BUSY"));
        assert!(row.contains("#42"));
        assert!(row.contains("31337"));
        assert!(row.ends_with("exited"));
    }
}
