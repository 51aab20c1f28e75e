//! In-process fanout backed by a `tokio::sync::broadcast` channel.

use serde::Serialize;
use tokio::sync::broadcast;

use super::{Channel, Notifier};

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A published event together with its topic.
///
/// Serializes to the frame pushed to websocket clients:
/// `{"event": "...", "channel": "tank:1", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub event: String,
    pub channel: Channel,
    #[serde(rename = "data")]
    pub payload: serde_json::Value,
}

/// Broadcast hub shared by the ingestion path and every websocket connection.
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    /// Create a hub with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe a lag.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier for NotificationHub {
    fn publish(&self, channel: Channel, event: &'static str, payload: serde_json::Value) {
        let notification = Notification {
            event: event.to_string(),
            channel,
            payload,
        };
        // SendError only means nobody is connected
        if self.sender.send(notification).is_err() {
            tracing::trace!(%channel, event, "No subscribers for notification");
        }
    }
}
