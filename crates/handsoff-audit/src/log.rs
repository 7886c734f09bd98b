//! The per-source decision log.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use handsoff_core::{DecisionSource, OperationKind, SessionStore, Tier};
use tracing::debug;

use crate::entry::{DecisionEntry, file_name_for};
use crate::error::{AuditError, AuditResult};

/// Appends decisions to per-source text files under a session directory.
///
/// The same directory holds the hooked session records, which is where the
/// workflow annotation of each line is read from.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    dir: PathBuf,
    sessions: SessionStore,
}

impl DecisionLog {
    /// Log into `session_dir`. The directory is created on first write.
    #[must_use]
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        let dir = session_dir.into();
        Self {
            sessions: SessionStore::new(dir.clone()),
            dir,
        }
    }

    /// Directory the trail files live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the trail file for `source`.
    #[must_use]
    pub fn path_for(&self, source: DecisionSource) -> PathBuf {
        self.dir.join(file_name_for(source))
    }

    /// Record one decision, looking up the session's workflow.
    ///
    /// # Errors
    ///
    /// Returns an error if the trail file cannot be opened or written.
    pub fn record(
        &self,
        session_id: &str,
        tool: &OperationKind,
        raw_target: &str,
        decision: Tier,
        source: DecisionSource,
    ) -> AuditResult<()> {
        let entry = DecisionEntry::new(
            session_id,
            self.sessions.workflow(session_id),
            tool.clone(),
            raw_target,
            decision,
            source,
        );
        self.append(&entry)
    }

    /// Append a prepared entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the trail file cannot be opened or written.
    pub fn append(&self, entry: &DecisionEntry) -> AuditResult<()> {
        let path = self.dir.join(entry.file_name());
        let io_err = |source: std::io::Error| AuditError::Io {
            path: path.display().to_string(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        writeln!(file, "{}", entry.to_line()).map_err(io_err)?;

        debug!(path = %path.display(), source = %entry.source, "Recorded decision");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn decisions_are_partitioned_by_source() {
        let tmp = TempDir::new().unwrap();
        let log = DecisionLog::new(tmp.path());

        log.record("s", &OperationKind::Bash, "ls", Tier::Allow, DecisionSource::Rules)
            .unwrap();
        log.record("s", &OperationKind::Bash, "make deploy", Tier::Deny, DecisionSource::Human)
            .unwrap();
        log.record("s", &OperationKind::Read, "/etc/hosts", Tier::Allow, DecisionSource::Rules)
            .unwrap();

        assert_eq!(read(&log.path_for(DecisionSource::Rules)).len(), 2);
        let human = read(&log.path_for(DecisionSource::Human));
        assert_eq!(human.len(), 1);
        assert!(human[0].ends_with("[deny] Bash | make deploy"));
        assert!(!log.path_for(DecisionSource::JudgeModel).exists());
    }

    #[test]
    fn workflow_comes_from_session_record() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("abc.json"),
            r#"{"workflow": "ultra-planner"}"#,
        )
        .unwrap();
        let log = DecisionLog::new(tmp.path());

        log.record("abc", &OperationKind::WebSearch, "query=rust", Tier::Allow, DecisionSource::JudgeModel)
            .unwrap();
        log.record("xyz", &OperationKind::WebSearch, "query=go", Tier::Ask, DecisionSource::ErrorFallback)
            .unwrap();

        let judge = read(&log.path_for(DecisionSource::JudgeModel));
        assert!(judge[0].contains("[abc] [plan] [allow]"));
        let fallback = read(&log.path_for(DecisionSource::ErrorFallback));
        assert!(fallback[0].contains("[xyz] [unknown] [ask]"));
    }

    #[test]
    fn missing_directory_is_created() {
        let tmp = TempDir::new().unwrap();
        let log = DecisionLog::new(tmp.path().join("nested/sessions"));
        log.record("s", &OperationKind::Bash, "ls", Tier::Allow, DecisionSource::Rules)
            .unwrap();
        assert!(log.path_for(DecisionSource::Rules).exists());
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let log = DecisionLog::new(&blocker);

        let result = log.record("s", &OperationKind::Bash, "ls", Tier::Allow, DecisionSource::Rules);
        assert!(matches!(result, Err(AuditError::Io { .. })));
    }
}
