//! Message text for approval requests and server notifications.
//!
//! Every message is sent with Telegram's HTML parse mode, so any text that
//! did not originate here goes through [`html_escape`] first.

use std::fmt::Write as _;

use handsoff_core::truncate_chars;

/// Longest target excerpt shown in an approval request.
pub const TARGET_DISPLAY_MAX_CHARS: usize = 200;

/// Length of the session id prefix shown in an approval request.
pub const SESSION_DISPLAY_CHARS: usize = 8;

/// Escape text for Telegram's HTML parse mode.
#[must_use]
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// The approval request posted to the chat.
#[must_use]
pub fn approval_request(tool: &str, raw_target: &str, session_id: &str) -> String {
    format!(
        "🔧 Tool Approval Request\n\nTool: {}\nTarget: {}\nSession: {}\n\nReply /allow or /deny",
        html_escape(tool),
        html_escape(truncate_chars(raw_target, TARGET_DISPLAY_MAX_CHARS)),
        html_escape(truncate_chars(session_id, SESSION_DISPLAY_CHARS)),
    )
}

/// Acknowledgement of an `/allow` command.
#[must_use]
pub fn allowed_ack(tool: &str) -> String {
    format!("✅ Allowed: {}", html_escape(tool))
}

/// Acknowledgement of a `/deny` command.
#[must_use]
pub fn denied_ack(tool: &str) -> String {
    format!("❌ Denied: {}", html_escape(tool))
}

/// Notice sent when no command arrived in time.
#[must_use]
pub fn timeout_notice(tool: &str) -> String {
    format!(
        "⏰ Timeout: No response for {}, falling back to local prompt",
        html_escape(tool)
    )
}

fn issue_ref(issue: u64, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("<a href=\"{}\">#{issue}</a>", html_escape(url)),
        None => format!("#{issue}"),
    }
}

/// A worker slot was assigned to an issue.
#[must_use]
pub fn worker_assignment(issue: u64, title: &str, slot: usize, url: Option<&str>) -> String {
    format!(
        "🔧 <b>Worker Assignment</b>\n\nIssue: {} {}\nWorker: {slot}",
        issue_ref(issue, url),
        html_escape(title),
    )
}

/// A worker finished its issue.
#[must_use]
pub fn worker_completion(issue: u64, slot: usize, url: Option<&str>) -> String {
    format!(
        "✅ <b>Worker Completed</b>\n\nIssue: {}\nWorker: {slot}",
        issue_ref(issue, url),
    )
}

/// Facts reported when the server starts.
#[derive(Debug, Clone, Default)]
pub struct StartupInfo {
    /// Host the server runs on.
    pub host: String,
    /// `owner/number` of the watched project board.
    pub project: String,
    /// Poll period in seconds.
    pub period_secs: u64,
    /// Worker slots (0 = unbounded).
    pub workers: usize,
    /// Directory the server runs in.
    pub working_dir: String,
}

/// The server came up.
#[must_use]
pub fn server_started(info: &StartupInfo) -> String {
    let mut text = String::from("🚀 <b>Handsoff Server Started</b>\n\n");
    let _ = writeln!(text, "Host: <code>{}</code>", html_escape(&info.host));
    let _ = writeln!(text, "Project: <code>{}</code>", html_escape(&info.project));
    let _ = writeln!(text, "Period: <code>{}s</code>", info.period_secs);
    if info.workers == 0 {
        let _ = writeln!(text, "Workers: <code>unbounded</code>");
    } else {
        let _ = writeln!(text, "Workers: <code>{}</code>", info.workers);
    }
    let _ = write!(
        text,
        "Working Dir: <code>{}</code>",
        html_escape(&info.working_dir)
    );
    text
}
