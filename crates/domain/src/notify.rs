//! Outbound purchaser notifications.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a notification channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// A channel that can deliver a text message to a purchaser.
///
/// Delivery is best effort: the purchase workflow logs failures and never
/// surfaces them to the caller.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Sends `message` to `destination`, typically a phone number.
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!(destination, message, "Notification");
        Ok(())
    }
}

/// A message captured by [`InMemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<SentMessage>,
    fail_on_send: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to reject every message.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_send = fail;
    }

    /// Returns every message delivered so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_send {
            return Err(NotifyError::Delivery("Gateway unavailable".to_string()));
        }

        state.sent.push(SentMessage {
            destination: destination.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
