//! Read-only view of hooked session records.
//!
//! Session records are written by the agent's workflow hooks, not by this
//! crate. The gate reads the `workflow` field to annotate decision logs and
//! the server reads the `state` field to detect finished workers. The only
//! mutation performed here is removal of the issue -> session index once a
//! completion has been reported.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

/// Workflow a session is running, as recorded by the workflow hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    /// Planning (`ultra-planner`).
    Plan,
    /// Implementation (`issue-to-impl`).
    Impl,
    /// No record, or a workflow without a short name.
    Unknown,
}

impl Workflow {
    /// Map a recorded workflow name onto its short form.
    #[must_use]
    pub fn from_record(name: &str) -> Self {
        match name {
            "ultra-planner" => Self::Plan,
            "issue-to-impl" => Self::Impl,
            _ => Self::Unknown,
        }
    }

    /// Short name used in log lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Impl => "impl",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of a session record this crate cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionState {
    /// Recorded workflow name.
    #[serde(default)]
    pub workflow: Option<String>,
    /// Recorded lifecycle state (`done` once the workflow finished).
    #[serde(default)]
    pub state: Option<String>,
}

impl SessionState {
    /// Whether the session recorded itself as finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.as_deref() == Some("done")
    }

    /// Short workflow name.
    #[must_use]
    pub fn workflow(&self) -> Workflow {
        self.workflow
            .as_deref()
            .map_or(Workflow::Unknown, Workflow::from_record)
    }
}

#[derive(Debug, Deserialize)]
struct IssueIndex {
    session_id: Option<String>,
}

/// Store of hooked session records under a session directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open a store rooted at `dir`. The directory does not have to exist.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The session directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a session record. Missing or unreadable records yield `None`.
    #[must_use]
    pub fn load(&self, session_id: &str) -> Option<SessionState> {
        if !is_safe_component(session_id) {
            debug!(session_id, "Refusing to load session with unsafe id");
            return None;
        }
        read_json(&self.dir.join(format!("{session_id}.json")))
    }

    /// Short workflow name for a session, `unknown` when unrecorded.
    #[must_use]
    pub fn workflow(&self, session_id: &str) -> Workflow {
        self.load(session_id)
            .map_or(Workflow::Unknown, |state| state.workflow())
    }

    /// Session id indexed for an issue, if any.
    #[must_use]
    pub fn session_for_issue(&self, issue: u64) -> Option<String> {
        read_json::<IssueIndex>(&self.issue_index_path(issue)).and_then(|index| index.session_id)
    }

    /// Combined lookup: issue index, then the session record it points at.
    #[must_use]
    pub fn state_for_issue(&self, issue: u64) -> Option<SessionState> {
        let session_id = self.session_for_issue(issue)?;
        self.load(&session_id)
    }

    /// Remove the issue index so a completion is reported only once.
    ///
    /// Best effort: a missing index is not an error.
    pub fn remove_issue_index(&self, issue: u64) {
        let path = self.issue_index_path(issue);
        if let Err(e) = std::fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %path.display(), error = %e, "Failed to remove issue index");
        }
    }

    fn issue_index_path(&self, issue: u64) -> PathBuf {
        self.dir.join("by-issue").join(format!("{issue}.json"))
    }
}

fn is_safe_component(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && id != "." && id != ".."
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring malformed session record");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn workflow_names_map_to_short_forms() {
        assert_eq!(Workflow::from_record("ultra-planner"), Workflow::Plan);
        assert_eq!(Workflow::from_record("issue-to-impl"), Workflow::Impl);
        assert_eq!(Workflow::from_record("something-else"), Workflow::Unknown);
    }

    #[test]
    fn workflow_lookup_reads_session_record() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "abc.json", r#"{"workflow": "issue-to-impl"}"#);

        let store = SessionStore::new(tmp.path());
        assert_eq!(store.workflow("abc"), Workflow::Impl);
        assert_eq!(store.workflow("missing"), Workflow::Unknown);
    }

    #[test]
    fn malformed_record_is_treated_as_missing() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "bad.json", "{not json");

        let store = SessionStore::new(tmp.path());
        assert!(store.load("bad").is_none());
        assert_eq!(store.workflow("bad"), Workflow::Unknown);
    }

    #[test]
    fn unsafe_session_ids_are_refused() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "secret.json", r#"{"workflow": "ultra-planner"}"#);
        let store = SessionStore::new(tmp.path().join("sessions"));

        assert!(store.load("../secret").is_none());
        assert!(store.load("..").is_none());
        assert!(store.load("").is_none());
    }

    #[test]
    fn issue_lookup_follows_index() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "by-issue/42.json", r#"{"session_id": "s-42"}"#);
        write(tmp.path(), "s-42.json", r#"{"workflow": "issue-to-impl", "state": "done"}"#);

        let store = SessionStore::new(tmp.path());
        assert_eq!(store.session_for_issue(42).as_deref(), Some("s-42"));
        let state = store.state_for_issue(42).unwrap();
        assert!(state.is_done());
        assert_eq!(state.workflow(), Workflow::Impl);
        assert!(store.state_for_issue(7).is_none());
    }

    #[test]
    fn removing_index_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "by-issue/5.json", r#"{"session_id": "s"}"#);

        let store = SessionStore::new(tmp.path());
        store.remove_issue_index(5);
        assert!(store.session_for_issue(5).is_none());
        store.remove_issue_index(5);
    }
}
