//! Outbound recovery notifications
//!
//! Everything the recovery subsystem reports downstream goes through one
//! stream of `RecoveryMessage`. Notifications are never dropped: a missed
//! producer-down cannot be reconstructed later.

use serde::{Deserialize, Serialize};

use types::ids::{RequestId, Urn};
use types::producer::Producer;
use types::recovery::{MessageTimestamp, ProducerStatusReason};

/// A producer went up or down, or its reason changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerStatus {
    pub producer: Producer,
    pub timestamp: MessageTimestamp,
    pub is_down: bool,
    /// Processing or user-session alives lag at emission time
    pub is_delayed: bool,
    pub reason: ProducerStatusReason,
}

/// A single-event replay finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecoveryMessage {
    pub producer: Producer,
    pub timestamp: MessageTimestamp,
    pub event_id: Urn,
    pub request_id: RequestId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecoveryMessage {
    ProducerStatus(ProducerStatus),
    EventRecovery(EventRecoveryMessage),
}

impl RecoveryMessage {
    pub fn producer(&self) -> &Producer {
        match self {
            RecoveryMessage::ProducerStatus(status) => &status.producer,
            RecoveryMessage::EventRecovery(message) => &message.producer,
        }
    }

    /// Get the message type as a string label for logging.
    pub fn type_label(&self) -> &'static str {
        match self {
            RecoveryMessage::ProducerStatus(_) => "ProducerStatus",
            RecoveryMessage::EventRecovery(_) => "EventRecovery",
        }
    }
}

impl From<ProducerStatus> for RecoveryMessage {
    fn from(status: ProducerStatus) -> Self {
        RecoveryMessage::ProducerStatus(status)
    }
}

impl From<EventRecoveryMessage> for RecoveryMessage {
    fn from(message: EventRecoveryMessage) -> Self {
        RecoveryMessage::EventRecovery(message)
    }
}
