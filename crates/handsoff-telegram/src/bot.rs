//! Telegram Bot API backend.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use handsoff_core::{IncomingMessage, MessagingBackend, MessagingError, MessagingResult, Update};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Bound on each API call, on top of any long-poll wait.
pub const API_TIMEOUT: Duration = Duration::from_secs(10);

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUpdate {
    update_id: i64,
    message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    message_id: i64,
    from: Option<WireUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: i64,
}

impl From<WireUpdate> for Update {
    fn from(wire: WireUpdate) -> Self {
        Self {
            update_id: wire.update_id,
            message: wire.message.map(|m| IncomingMessage {
                message_id: m.message_id,
                from_id: m.from.map(|u| u.id),
                text: m.text,
            }),
        }
    }
}

/// A bot identified by its API token.
///
/// Every message is sent with the HTML parse mode.
#[derive(Clone)]
pub struct TelegramBot {
    client: Client,
    token: String,
    api_base: String,
}

impl fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramBot")
            .field("token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramBot {
    /// Create a bot for `token` against the public API.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the bot at a different API host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        wait: Duration,
    ) -> MessagingResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(API_TIMEOUT.saturating_add(wait))
            .json(body)
            .send()
            .await
            // Strip the URL: it carries the token.
            .map_err(|e| MessagingError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| MessagingError::Decode(e.without_url().to_string()))?;

        if !envelope.ok {
            let description = envelope
                .description
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(MessagingError::Api(format!("{method}: {description}")));
        }
        envelope
            .result
            .ok_or_else(|| MessagingError::Decode(format!("{method}: missing result")))
    }
}

#[async_trait]
impl MessagingBackend for TelegramBot {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> MessagingResult<i64> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(reply_to) = reply_to {
            body["reply_to_message_id"] = Value::from(reply_to);
        }

        let sent: WireMessage = self.call("sendMessage", &body, Duration::ZERO).await?;
        debug!(chat_id, message_id = sent.message_id, "Sent Telegram message");
        Ok(sent.message_id)
    }

    async fn get_updates(
        &self,
        offset: i64,
        limit: Option<u32>,
        wait: Duration,
    ) -> MessagingResult<Vec<Update>> {
        // The API takes whole seconds; round up so a short wait still blocks.
        let wait_secs = wait
            .as_secs()
            .saturating_add(u64::from(wait.subsec_nanos() > 0));
        let mut body = json!({
            "offset": offset,
            "timeout": wait_secs,
        });
        if let Some(limit) = limit {
            body["limit"] = Value::from(limit);
        }

        let updates: Vec<WireUpdate> = self.call("getUpdates", &body, wait).await?;
        Ok(updates.into_iter().map(Update::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let bot = TelegramBot::new("123:secret");
        let rendered = format!("{bot:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn method_url_joins_base_and_token() {
        let bot = TelegramBot::new("123:abc").with_api_base("http://localhost:8081/");
        assert_eq!(
            bot.method_url("getUpdates"),
            "http://localhost:8081/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn wire_update_maps_sender_and_text() {
        let raw = r#"{
            "ok": true,
            "result": [
                {"update_id": 7, "message": {"message_id": 3, "from": {"id": 42, "is_bot": false}, "chat": {"id": 1}, "text": "/allow"}},
                {"update_id": 8, "edited_message": {"message_id": 3}}
            ]
        }"#;
        let envelope: ApiResponse<Vec<WireUpdate>> = serde_json::from_str(raw).unwrap();
        let updates: Vec<Update> = envelope
            .result
            .unwrap()
            .into_iter()
            .map(Update::from)
            .collect();

        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.from_id, Some(42));
        assert_eq!(message.text.as_deref(), Some("/allow"));
        assert_eq!(updates[1].update_id, 8);
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn error_envelope_carries_description() {
        let raw = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let envelope: ApiResponse<WireMessage> = serde_json::from_str(raw).unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.description.as_deref(), Some("Unauthorized"));
    }
}
