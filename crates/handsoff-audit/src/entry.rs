//! A single recorded decision.

use chrono::{DateTime, SecondsFormat, Utc};
use handsoff_core::{DecisionSource, OperationKind, Tier, Workflow};

/// One line of the decision trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionEntry {
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Session that requested the operation.
    pub session_id: String,
    /// Workflow the session was running.
    pub workflow: Workflow,
    /// The final tier.
    pub decision: Tier,
    /// The authority that produced it.
    pub source: DecisionSource,
    /// The gated tool.
    pub tool: OperationKind,
    /// The target exactly as requested, before normalization.
    pub raw_target: String,
}

impl DecisionEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        workflow: Workflow,
        tool: OperationKind,
        raw_target: impl Into<String>,
        decision: Tier,
        source: DecisionSource,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            workflow,
            decision,
            source,
            tool,
            raw_target: raw_target.into(),
        }
    }

    /// Override the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Render as `[time] [session] [workflow] [decision] tool | target`.
    ///
    /// Line breaks inside the target are escaped so one decision is always
    /// one line.
    #[must_use]
    pub fn to_line(&self) -> String {
        let target = self.raw_target.replace('\r', "\\r").replace('\n', "\\n");
        format!(
            "[{}] [{}] [{}] [{}] {} | {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.session_id,
            self.workflow,
            self.decision,
            self.tool,
            target
        )
    }

    /// File the entry belongs in.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        file_name_for(self.source)
    }
}

/// Trail file for a decision source.
#[must_use]
pub(crate) fn file_name_for(source: DecisionSource) -> &'static str {
    match source {
        DecisionSource::Rules => "tool-rules.txt",
        DecisionSource::JudgeModel => "tool-judge-determined.txt",
        DecisionSource::Human => "tool-human-determined.txt",
        DecisionSource::ErrorFallback => "tool-error-fallback.txt",
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_entry(target: &str) -> DecisionEntry {
        DecisionEntry::new(
            "s-1",
            Workflow::Impl,
            OperationKind::Bash,
            target,
            Tier::Deny,
            DecisionSource::Rules,
        )
        .with_timestamp(Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap())
    }

    #[test]
    fn line_format() {
        assert_eq!(
            fixed_entry("cd /tmp").to_line(),
            "[2026-03-01T12:30:00Z] [s-1] [impl] [deny] Bash | cd /tmp"
        );
    }

    #[test]
    fn multi_line_targets_stay_on_one_line() {
        let line = fixed_entry("echo a\necho b").to_line();
        assert!(!line.contains('\n'));
        assert!(line.ends_with("echo a\\necho b"));
    }

    #[test]
    fn every_source_has_its_own_file() {
        let names = [
            DecisionSource::Rules,
            DecisionSource::JudgeModel,
            DecisionSource::Human,
            DecisionSource::ErrorFallback,
        ]
        .map(file_name_for);
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
