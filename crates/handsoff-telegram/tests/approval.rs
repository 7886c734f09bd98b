//! Approval channel scenarios against the mock messenger.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use handsoff_core::Tier;
use handsoff_telegram::{ApprovalChannel, ApprovalOutcome, ApprovalSettings, Inconclusive};
use handsoff_test::{MockMessenger, init_test_tracing};
use tokio::time::Instant;

fn channel(messenger: &MockMessenger, settings: ApprovalSettings) -> ApprovalChannel {
    init_test_tracing();
    ApprovalChannel::new(Arc::new(messenger.clone()), settings)
}

fn settings() -> ApprovalSettings {
    ApprovalSettings::new("chat-1")
        .with_timeout(Duration::from_secs(60))
        .with_poll_interval(Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn allow_reply_approves_and_is_acknowledged() {
    let messenger = MockMessenger::new().with_reply(7, "/allow");
    let approval = channel(&messenger, settings());

    let outcome = approval.request("Bash", "make deploy", "session-abcdef").await;

    assert_eq!(outcome, ApprovalOutcome::Allow);
    let sent = messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.starts_with("🔧 Tool Approval Request"));
    assert!(sent[0].text.contains("Session: session-"));
    assert_eq!(sent[0].reply_to, None);
    assert_eq!(sent[1].text, "✅ Allowed: Bash");
    // The acknowledgement answers the command message, not the request.
    assert_eq!(sent[1].reply_to, Some(1));
}

#[tokio::test(start_paused = true)]
async fn deny_reply_denies() {
    let messenger = MockMessenger::new().with_reply(7, "/deny");
    let approval = channel(&messenger, settings());

    let outcome = approval.request("Write", "/etc/hosts", "s").await;

    assert_eq!(outcome, ApprovalOutcome::Deny);
    assert_eq!(outcome.tier(), Tier::Deny);
    assert_eq!(messenger.sent_texts()[1], "❌ Denied: Write");
}

#[tokio::test(start_paused = true)]
async fn chatter_before_the_command_is_skipped() {
    let messenger = MockMessenger::new().with_replies(&[(7, "on it"), (7, "  /ALLOW  ")]);
    let approval = channel(&messenger, settings());

    assert_eq!(
        approval.request("Bash", "cargo publish", "s").await,
        ApprovalOutcome::Allow
    );
}

#[tokio::test(start_paused = true)]
async fn unlisted_responders_cannot_decide() {
    let messenger = MockMessenger::new().with_replies(&[(8, "/allow"), (7, "/deny")]);
    let approval = channel(&messenger, settings().with_allowed_users([7]));

    assert_eq!(
        approval.request("Bash", "git push", "s").await,
        ApprovalOutcome::Deny
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_resolves_to_ask_with_notice_on_request() {
    // A command sent before the request was opened must not be replayed.
    let messenger = MockMessenger::new().with_backlog(7, "/allow");
    let approval = channel(&messenger, settings());
    let start = Instant::now();

    let outcome = approval.request("Bash", "terraform apply", "s").await;

    assert_eq!(outcome, ApprovalOutcome::Inconclusive(Inconclusive::Timeout));
    assert_eq!(outcome.tier(), Tier::Ask);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed < Duration::from_secs(61));

    let sent = messenger.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[1].text,
        "⏰ Timeout: No response for Bash, falling back to local prompt"
    );
    assert_eq!(sent[1].reply_to, Some(sent[0].message_id));

    let offsets = messenger.polled_offsets();
    assert_eq!(offsets[0], -1);
    assert!(offsets[1..].iter().all(|&offset| offset == 1001));
}

#[tokio::test(start_paused = true)]
async fn failed_request_send_is_inconclusive() {
    let messenger = MockMessenger::new()
        .with_failing_sends(1)
        .with_reply(7, "/allow");
    let approval = channel(&messenger, settings());

    let outcome = approval.request("Bash", "ls", "s").await;

    assert_eq!(outcome, ApprovalOutcome::Inconclusive(Inconclusive::SendFailed));
    assert!(messenger.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreadable_offset_is_inconclusive() {
    let messenger = MockMessenger::new().with_failing_polls(1);
    let approval = channel(&messenger, settings());

    let outcome = approval.request("Bash", "ls", "s").await;

    assert_eq!(
        outcome,
        ApprovalOutcome::Inconclusive(Inconclusive::OffsetUnavailable)
    );
    assert!(messenger.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_polls_are_retried_until_a_reply_arrives() {
    let messenger = MockMessenger::new()
        .with_failing_reply_polls(2)
        .with_reply(7, "/allow");
    let approval = channel(&messenger, settings());
    let start = Instant::now();

    let outcome = approval.request("Bash", "make deploy", "s").await;

    assert_eq!(outcome, ApprovalOutcome::Allow);
    // Each failure waits one poll interval before the next attempt.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(11));
    assert_eq!(messenger.polled_offsets().len(), 4);
    assert_eq!(messenger.sent_texts()[1], "✅ Allowed: Bash");
}

#[tokio::test(start_paused = true)]
async fn polls_failing_until_the_deadline_time_out() {
    let messenger = MockMessenger::new()
        .with_failing_reply_polls(usize::MAX)
        .with_reply(7, "/allow");
    let approval = channel(
        &messenger,
        settings().with_timeout(Duration::from_secs(12)),
    );
    let start = Instant::now();

    let outcome = approval.request("Bash", "make deploy", "s").await;

    assert_eq!(outcome, ApprovalOutcome::Inconclusive(Inconclusive::Timeout));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(12));
    assert!(elapsed < Duration::from_secs(13));
    // Offset query, then failed polls backing off 5s, 5s and 2s.
    assert_eq!(messenger.polled_offsets().len(), 4);
    let sent = messenger.sent_texts();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].starts_with("⏰ Timeout"));
}

#[tokio::test(start_paused = true)]
async fn last_poll_is_shortened_to_the_remaining_time() {
    let messenger = MockMessenger::new();
    let approval = channel(
        &messenger,
        settings().with_timeout(Duration::from_secs(12)),
    );
    let start = Instant::now();

    let outcome = approval.request("Bash", "ls", "s").await;

    assert_eq!(outcome, ApprovalOutcome::Inconclusive(Inconclusive::Timeout));
    assert!(start.elapsed() >= Duration::from_secs(12));
    // Offset query, then polls of 5s, 5s and 2s.
    assert_eq!(messenger.polled_offsets().len(), 4);
}
