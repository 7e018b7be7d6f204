//! Flag change notification
//!
//! Mutation operations publish a change event to an internal broadcast
//! channel. Publishing is a synchronous, best-effort send: subscribers
//! drain at their own pace and can never block or slow down the mutation
//! call. A subscriber that falls behind the buffer loses the oldest
//! events (`RecvError::Lagged`) rather than applying backpressure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Kind of mutation that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagChangeKind {
    Registered,
    Updated,
    Unregistered,
    OverrideSet,
    OverrideRemoved,
    ConfigurationImported,
}

/// A single flag change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagChangeEvent {
    pub id: Uuid,
    pub kind: FlagChangeKind,
    pub flag_key: String,
    pub timestamp: DateTime<Utc>,
}

impl FlagChangeEvent {
    pub fn new(kind: FlagChangeKind, flag_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            flag_key: flag_key.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast bus for flag change events
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<FlagChangeEvent>,
}

impl ChangeBus {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    /// Subscribe to future change events.
    pub fn subscribe(&self) -> broadcast::Receiver<FlagChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish a change event. Never blocks; an absent audience is fine.
    pub fn publish(&self, kind: FlagChangeKind, flag_key: &str) {
        let event = FlagChangeEvent::new(kind, flag_key);
        debug!(flag = flag_key, kind = ?kind, "publishing flag change");
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
