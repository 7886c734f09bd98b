//! Messaging backend abstraction.
//!
//! The human approval tier and the server's notifications consume exactly
//! two backend operations: "send message" and "get updates since offset".

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MessagingResult;

/// One update delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// The message carried by the update, if it is a message update.
    pub message: Option<IncomingMessage>,
}

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Backend message identifier.
    pub message_id: i64,
    /// Sender identifier, when the backend reports one.
    pub from_id: Option<i64>,
    /// Message text, when the message is textual.
    pub text: Option<String>,
}

/// A chat backend able to send messages and deliver updates.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// Send `text` to `chat_id`, optionally as a reply. Returns the id of
    /// the sent message.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> MessagingResult<i64>;

    /// Fetch updates starting at `offset`.
    ///
    /// `wait` is the long-poll bound: the backend call itself may block up
    /// to this long waiting for new updates. A negative offset addresses
    /// updates from the end of the queue.
    async fn get_updates(
        &self,
        offset: i64,
        limit: Option<u32>,
        wait: Duration,
    ) -> MessagingResult<Vec<Update>>;

    /// Identifier of the most recent pending update, if any.
    async fn latest_update_id(&self) -> MessagingResult<Option<i64>> {
        let updates = self.get_updates(-1, Some(1), Duration::ZERO).await?;
        Ok(updates.last().map(|u| u.update_id))
    }
}
