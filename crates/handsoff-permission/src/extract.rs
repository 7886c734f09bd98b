//! Target extraction: one display string per requested operation.

use handsoff_core::{OperationKind, truncate_chars};
use serde_json::Value;

/// Longest serialized payload used as the target of an unknown tool.
pub const GENERIC_TARGET_MAX_CHARS: usize = 100;

fn field<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Render a scalar field, numbers included.
fn scalar(input: &Value, key: &str) -> String {
    match input.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn pattern_and_path(input: &Value) -> String {
    let pattern = field(input, "pattern");
    match field(input, "path") {
        "" => format!("pattern={pattern}"),
        path => format!("pattern={pattern} path={path}"),
    }
}

/// Summarize the object of an operation as a single string.
///
/// Missing fields render as empty strings, and unknown tools fall back to
/// their serialized payload, so extraction never fails.
#[must_use]
pub fn extract_target(kind: &OperationKind, input: &Value) -> String {
    match kind {
        OperationKind::Read
        | OperationKind::Write
        | OperationKind::Edit
        | OperationKind::NotebookEdit => field(input, "file_path").to_string(),
        OperationKind::Bash => field(input, "command").to_string(),
        OperationKind::Grep | OperationKind::Glob => pattern_and_path(input),
        OperationKind::Task => format!(
            "subagent={} desc={}",
            field(input, "subagent_type"),
            field(input, "description")
        ),
        OperationKind::Skill => match field(input, "args") {
            "" => field(input, "skill").to_string(),
            args => format!("{} {args}", field(input, "skill")),
        },
        OperationKind::WebFetch => field(input, "url").to_string(),
        OperationKind::WebSearch => format!("query={}", field(input, "query")),
        OperationKind::Lsp => format!(
            "op={} file={}:{}",
            field(input, "operation"),
            field(input, "filePath"),
            scalar(input, "line")
        ),
        OperationKind::AskUserQuestion => {
            let headers: Vec<&str> = input
                .get("questions")
                .and_then(Value::as_array)
                .map(|questions| questions.iter().map(|q| field(q, "header")).collect())
                .unwrap_or_default();
            if headers.is_empty() {
                String::new()
            } else {
                format!("questions={}", headers.join(","))
            }
        },
        OperationKind::TodoWrite => {
            let count = input
                .get("todos")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            format!("todos={count}")
        },
        OperationKind::Other(_) => {
            truncate_chars(&input.to_string(), GENERIC_TARGET_MAX_CHARS).to_string()
        },
    }
}
