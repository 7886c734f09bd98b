//! Handsoff Telegram - chat backend for human approval and notifications.
//!
//! This crate provides:
//! - [`TelegramBot`], a [`MessagingBackend`](handsoff_core::MessagingBackend)
//!   over the Bot API's `sendMessage` and `getUpdates`
//! - [`ApprovalChannel`], the long-poll approval protocol used as the last
//!   escalation tier
//! - [`Notifier`] and the [`format`] helpers for server notifications

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod approval;
mod bot;
pub mod format;
mod notify;

pub use approval::{
    ApprovalChannel, ApprovalOutcome, ApprovalRequest, ApprovalSettings, Inconclusive,
    MAX_POLL_WAIT,
};
pub use bot::{API_TIMEOUT, TelegramBot};
pub use format::StartupInfo;
pub use notify::Notifier;
