//! Fire-and-forget server notifications.

use std::fmt;
use std::sync::Arc;

use handsoff_core::MessagingBackend;
use tracing::warn;

/// Sends notifications to a single chat.
///
/// Delivery failures are logged and reported as `false`; they never
/// interrupt the caller.
#[derive(Clone)]
pub struct Notifier {
    backend: Arc<dyn MessagingBackend>,
    chat_id: String,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Notify `chat_id` through `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn MessagingBackend>, chat_id: impl Into<String>) -> Self {
        Self {
            backend,
            chat_id: chat_id.into(),
        }
    }

    /// Send `text`. Returns whether it was delivered.
    pub async fn notify(&self, text: &str) -> bool {
        match self.backend.send_message(&self.chat_id, text, None).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Notification failed");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsoff_test::MockMessenger;

    #[tokio::test]
    async fn delivery_is_reported() {
        let messenger = MockMessenger::new().with_failing_sends(1);
        let notifier = Notifier::new(Arc::new(messenger.clone()), "ops");

        assert!(!notifier.notify("first").await);
        assert!(notifier.notify("second").await);

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, "ops");
        assert_eq!(sent[0].text, "second");
    }
}
