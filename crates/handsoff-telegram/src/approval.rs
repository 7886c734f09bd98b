//! Human approval over a chat long-poll.
//!
//! One [`ApprovalChannel::request`] call posts an approval request, then
//! long-polls for an `/allow` or `/deny` command until the configured
//! timeout. The update offset is pinned past every update that existed
//! before the request was sent, so a command meant for an earlier request
//! can never resolve this one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use handsoff_core::{MessagingBackend, Tier, Update};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::format;

/// Upper bound on a single long-poll wait.
pub const MAX_POLL_WAIT: Duration = Duration::from_secs(30);

/// Settings for the approval channel.
#[derive(Debug, Clone)]
pub struct ApprovalSettings {
    /// Chat the requests are posted to.
    pub chat_id: String,
    /// How long to wait for a command.
    pub timeout: Duration,
    /// Long-poll wait, and the back-off after a failed poll.
    pub poll_interval: Duration,
    /// Senders allowed to answer. Empty means anyone in the chat.
    pub allowed_user_ids: Vec<i64>,
}

impl ApprovalSettings {
    /// Settings for `chat_id` with a 60 second timeout and 5 second polls.
    #[must_use]
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            allowed_user_ids: Vec::new(),
        }
    }

    /// Set the overall timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Restrict who may answer.
    #[must_use]
    pub fn with_allowed_users(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.allowed_user_ids = ids.into_iter().collect();
        self
    }
}

/// Why the channel could not produce a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inconclusive {
    /// Nobody answered in time.
    Timeout,
    /// The request message could not be posted.
    SendFailed,
    /// The backend could not report its pending updates.
    OffsetUnavailable,
}

impl fmt::Display for Inconclusive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::SendFailed => write!(f, "send failed"),
            Self::OffsetUnavailable => write!(f, "offset unavailable"),
        }
    }
}

/// Result of one approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// A responder sent `/allow`.
    Allow,
    /// A responder sent `/deny`.
    Deny,
    /// No verdict.
    Inconclusive(Inconclusive),
}

impl ApprovalOutcome {
    /// The tier this outcome resolves to. Anything inconclusive is `ask`.
    #[must_use]
    pub fn tier(self) -> Tier {
        match self {
            Self::Allow => Tier::Allow,
            Self::Deny => Tier::Deny,
            Self::Inconclusive(_) => Tier::Ask,
        }
    }
}

/// A command parsed from a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Allow,
    Deny,
}

fn is_command(text: &str, name: &str) -> bool {
    match text.strip_prefix(name) {
        Some(rest) => rest.is_empty() || rest.starts_with(' ') || rest.starts_with('@'),
        None => false,
    }
}

fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim().to_lowercase();
    if is_command(&text, "/allow") {
        Some(Command::Allow)
    } else if is_command(&text, "/deny") {
        Some(Command::Deny)
    } else {
        None
    }
}

enum PollStep {
    Decided(ApprovalOutcome),
    Pending,
    Expired,
}

/// State of one pending request.
#[derive(Debug)]
pub struct ApprovalRequest {
    /// Chat the request was posted to.
    pub chat_id: String,
    /// Id of the posted request message.
    pub sent_message_id: i64,
    /// Next update id to consume. Only ever moves forward.
    pub update_offset: i64,
    /// When the request was posted.
    pub started_at: Instant,
    /// How long the request stays open.
    pub timeout: Duration,
    /// Senders allowed to answer. Empty means anyone.
    pub allowed_responder_ids: Vec<i64>,
}

impl ApprovalRequest {
    /// Time left before the request expires.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started_at.elapsed())
    }

    /// Move the offset past `update_id`.
    pub fn advance(&mut self, update_id: i64) {
        self.update_offset = self.update_offset.max(update_id.saturating_add(1));
    }

    /// Whether `from_id` may answer.
    #[must_use]
    pub fn accepts(&self, from_id: Option<i64>) -> bool {
        if self.allowed_responder_ids.is_empty() {
            return true;
        }
        from_id.is_some_and(|id| self.allowed_responder_ids.contains(&id))
    }

    /// Consume `update`, returning a command and the id of the message that
    /// carried it.
    fn consume(&mut self, update: &Update) -> Option<(Command, i64)> {
        self.advance(update.update_id);
        let message = update.message.as_ref()?;
        if !self.accepts(message.from_id) {
            debug!(from = ?message.from_id, "Ignoring reply from unlisted sender");
            return None;
        }
        let command = parse_command(message.text.as_deref()?)?;
        Some((command, message.message_id))
    }
}

/// Posts approval requests and waits for a human verdict.
#[derive(Clone)]
pub struct ApprovalChannel {
    backend: Arc<dyn MessagingBackend>,
    settings: ApprovalSettings,
}

impl fmt::Debug for ApprovalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalChannel")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ApprovalChannel {
    /// Create a channel over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn MessagingBackend>, settings: ApprovalSettings) -> Self {
        Self { backend, settings }
    }

    /// The channel settings.
    #[must_use]
    pub fn settings(&self) -> &ApprovalSettings {
        &self.settings
    }

    /// Ask a human to approve `tool` on `raw_target`.
    ///
    /// Never fails: every backend fault ends the request as
    /// [`ApprovalOutcome::Inconclusive`].
    pub async fn request(&self, tool: &str, raw_target: &str, session_id: &str) -> ApprovalOutcome {
        let chat_id = self.settings.chat_id.as_str();

        let update_offset = match self.backend.latest_update_id().await {
            Ok(Some(latest)) => latest.saturating_add(1),
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "Could not read pending updates, skipping human approval");
                return ApprovalOutcome::Inconclusive(Inconclusive::OffsetUnavailable);
            },
        };

        let text = format::approval_request(tool, raw_target, session_id);
        let sent_message_id = match self.backend.send_message(chat_id, &text, None).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, tool, "Could not post approval request");
                return ApprovalOutcome::Inconclusive(Inconclusive::SendFailed);
            },
        };
        info!(tool, message_id = sent_message_id, "Posted approval request");

        let mut request = ApprovalRequest {
            chat_id: chat_id.to_string(),
            sent_message_id,
            update_offset,
            started_at: Instant::now(),
            timeout: self.settings.timeout,
            allowed_responder_ids: self.settings.allowed_user_ids.clone(),
        };

        loop {
            match self.poll_once(&mut request, tool).await {
                PollStep::Decided(outcome) => return outcome,
                PollStep::Pending => {},
                PollStep::Expired => break,
            }
        }

        info!(tool, "Approval request timed out");
        let notice = format::timeout_notice(tool);
        if let Err(e) = self
            .backend
            .send_message(chat_id, &notice, Some(request.sent_message_id))
            .await
        {
            warn!(error = %e, "Could not send timeout notice");
        }
        ApprovalOutcome::Inconclusive(Inconclusive::Timeout)
    }

    async fn poll_once(&self, request: &mut ApprovalRequest, tool: &str) -> PollStep {
        let remaining = request.remaining();
        if remaining.is_zero() {
            return PollStep::Expired;
        }
        let wait = self.settings.poll_interval.min(remaining).min(MAX_POLL_WAIT);

        let updates = match self
            .backend
            .get_updates(request.update_offset, None, wait)
            .await
        {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Polling for approval replies failed");
                tokio::time::sleep(self.settings.poll_interval.min(request.remaining())).await;
                return PollStep::Pending;
            },
        };

        for update in &updates {
            let Some((command, message_id)) = request.consume(update) else {
                continue;
            };
            let (outcome, ack) = match command {
                Command::Allow => (ApprovalOutcome::Allow, format::allowed_ack(tool)),
                Command::Deny => (ApprovalOutcome::Deny, format::denied_ack(tool)),
            };
            info!(tool, outcome = ?outcome, "Approval reply received");
            if let Err(e) = self
                .backend
                .send_message(&request.chat_id, &ack, Some(message_id))
                .await
            {
                warn!(error = %e, "Could not acknowledge approval reply");
            }
            return PollStep::Decided(outcome);
        }
        PollStep::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsoff_core::IncomingMessage;

    fn request(allowed: Vec<i64>) -> ApprovalRequest {
        ApprovalRequest {
            chat_id: "c".to_string(),
            sent_message_id: 1,
            update_offset: 10,
            started_at: Instant::now(),
            timeout: Duration::from_secs(60),
            allowed_responder_ids: allowed,
        }
    }

    fn update(id: i64, from: Option<i64>, text: &str) -> Update {
        Update {
            update_id: id,
            message: Some(IncomingMessage {
                message_id: id,
                from_id: from,
                text: Some(text.to_string()),
            }),
        }
    }

    #[test]
    fn commands_are_trimmed_and_case_insensitive() {
        assert_eq!(parse_command("  /ALLOW "), Some(Command::Allow));
        assert_eq!(parse_command("/allow please"), Some(Command::Allow));
        assert_eq!(parse_command("/deny@handsoff_bot"), Some(Command::Deny));
        assert_eq!(parse_command("/allowed"), None);
        assert_eq!(parse_command("allow"), None);
    }

    #[test]
    fn offset_never_moves_backwards() {
        let mut req = request(Vec::new());
        req.advance(20);
        req.advance(5);
        assert_eq!(req.update_offset, 21);
    }

    #[test]
    fn unlisted_sender_is_consumed_but_ignored() {
        let mut req = request(vec![7]);
        assert!(req.consume(&update(30, Some(8), "/allow")).is_none());
        assert_eq!(req.update_offset, 31);
        assert!(req.consume(&update(31, None, "/allow")).is_none());
        assert_eq!(
            req.consume(&update(32, Some(7), "/deny")),
            Some((Command::Deny, 32))
        );
    }

    #[test]
    fn inconclusive_resolves_to_ask() {
        assert_eq!(
            ApprovalOutcome::Inconclusive(Inconclusive::Timeout).tier(),
            Tier::Ask
        );
        assert_eq!(ApprovalOutcome::Allow.tier(), Tier::Allow);
        assert_eq!(ApprovalOutcome::Deny.tier(), Tier::Deny);
    }
}
