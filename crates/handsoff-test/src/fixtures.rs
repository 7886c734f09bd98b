//! Fixtures for the on-disk state the gate and the server read.

use std::path::Path;

use serde_json::{Value, json};

/// Write a hooked session record `<dir>/<session_id>.json`.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_session(dir: &Path, session_id: &str, workflow: &str, state: Option<&str>) {
    let mut record = json!({ "workflow": workflow });
    if let Some(state) = state {
        record["state"] = Value::from(state);
    }
    std::fs::create_dir_all(dir).expect("create session dir");
    std::fs::write(dir.join(format!("{session_id}.json")), record.to_string())
        .expect("write session record");
}

/// Write the issue index `<dir>/by-issue/<issue>.json` pointing at a session.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_issue_index(dir: &Path, issue: u64, session_id: &str) {
    let index_dir = dir.join("by-issue");
    std::fs::create_dir_all(&index_dir).expect("create index dir");
    std::fs::write(
        index_dir.join(format!("{issue}.json")),
        json!({ "session_id": session_id }).to_string(),
    )
    .expect("write issue index");
}

/// A hook request payload as the host sends it on stdin.
#[must_use]
pub fn hook_request(tool: &str, session_id: &str, tool_input: Value) -> Value {
    json!({
        "tool_name": tool,
        "session_id": session_id,
        "tool_input": tool_input,
    })
}

/// A shell command hook request.
#[must_use]
pub fn bash_request(command: &str) -> Value {
    hook_request("Bash", "test-session", json!({ "command": command }))
}

/// The pid of the current (live) process.
#[must_use]
pub fn live_pid() -> u32 {
    std::process::id()
}

/// The pid of a process that has already exited and been reaped.
///
/// # Panics
///
/// Panics if `true` cannot be run.
#[must_use]
pub fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true")
        .spawn()
        .expect("spawn short-lived process");
    let pid = child.id();
    child.wait().expect("reap short-lived process");
    pid
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_fixture_is_readable_by_the_store() {
        let tmp = tempfile::tempdir().unwrap();
        write_session(tmp.path(), "s-1", "issue-to-impl", Some("done"));
        write_issue_index(tmp.path(), 9, "s-1");

        let store = handsoff_core::SessionStore::new(tmp.path());
        let state = store.state_for_issue(9).unwrap();
        assert!(state.is_done());
    }

    #[test]
    fn dead_pid_differs_from_live_pid() {
        assert_ne!(dead_pid(), live_pid());
    }

    #[test]
    fn bash_request_shape() {
        let request = bash_request("ls -la");
        assert_eq!(request["tool_name"], "Bash");
        assert_eq!(request["tool_input"]["command"], "ls -la");
    }
}
