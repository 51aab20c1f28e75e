//! Real-time notification fanout.
//!
//! The ingestion core only sees the [`Notifier`] trait; the websocket endpoint
//! subscribes to the [`NotificationHub`] and filters by channel per connection.

pub mod hub;

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};

pub use hub::{Notification, NotificationHub};

/// Event emitted for every stored reading.
pub const EVENT_SENSOR_READING: &str = "sensor_reading";
/// Event emitted when a threshold alert is opened.
pub const EVENT_NEW_ALERT: &str = "new_alert";
/// Event emitted when an operator resolves an alert.
pub const EVENT_ALERT_RESOLVED: &str = "alert_resolved";

/// Notification topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Only clients subscribed to this tank
    Tank(i32),
    /// Every connected client
    Global,
}

impl Channel {
    /// Whether a client with the given tank subscriptions receives this channel.
    #[must_use]
    pub fn reaches(&self, subscribed_tanks: &HashSet<i32>) -> bool {
        match self {
            Self::Global => true,
            Self::Tank(id) => subscribed_tanks.contains(id),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tank(id) => write!(f, "tank:{id}"),
            Self::Global => f.write_str("global"),
        }
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fire-and-forget publisher. No delivery guarantee, no replay.
pub trait Notifier: Send + Sync {
    fn publish(&self, channel: Channel, event: &'static str, payload: serde_json::Value);
}
