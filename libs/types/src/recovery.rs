//! Recovery state and producer status reasons
//!
//! State IDs and reason codes match the feed SDK wire values so status
//! notifications can be forwarded verbatim.

use serde::{Deserialize, Serialize};

/// Lifecycle of a producer's current full recovery
///
/// `Default` means no recovery was ever requested for the producer.
/// Transitions only move forward: a new recovery replaces the previous
/// record and starts again from `Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryState {
    #[default]
    Default,
    NotStarted,
    Started,
    Completed,
    Interrupted,
    Error,
}

impl RecoveryState {
    /// A replay is underway, possibly interrupted and awaiting resumption.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, RecoveryState::Started | RecoveryState::Interrupted)
    }
}

/// Why a producer was flagged down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProducerDownReason {
    #[default]
    Default,
    /// No system alive within the inactivity window
    AliveIntervalViolation,
    /// Messages are processed too long after they were generated
    ProcessingQueueDelayViolation,
    Other,
}

/// Why a producer was flagged up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProducerUpReason {
    #[default]
    Default,
    FirstRecoveryCompleted,
    ProcessingQueueDelayStabilized,
    ReturnedFromInactivity,
}

/// Reason carried on a producer status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProducerStatusReason {
    #[default]
    Error,
    FirstRecoveryCompleted,
    ProcessingQueueDelayStabilized,
    ReturnedFromInactivity,
    AliveIntervalViolation,
    ProcessingQueueDelayViolation,
    Other,
}

impl ProducerStatusReason {
    /// Get the reason code for wire protocol
    pub fn code(&self) -> u8 {
        match self {
            ProducerStatusReason::Error => 0,
            ProducerStatusReason::FirstRecoveryCompleted => 1,
            ProducerStatusReason::ProcessingQueueDelayStabilized => 2,
            ProducerStatusReason::ReturnedFromInactivity => 3,
            ProducerStatusReason::AliveIntervalViolation => 4,
            ProducerStatusReason::ProcessingQueueDelayViolation => 5,
            ProducerStatusReason::Other => 6,
        }
    }
}

impl From<ProducerDownReason> for ProducerStatusReason {
    fn from(reason: ProducerDownReason) -> Self {
        match reason {
            ProducerDownReason::AliveIntervalViolation => ProducerStatusReason::AliveIntervalViolation,
            ProducerDownReason::ProcessingQueueDelayViolation => {
                ProducerStatusReason::ProcessingQueueDelayViolation
            }
            ProducerDownReason::Other => ProducerStatusReason::Other,
            ProducerDownReason::Default => ProducerStatusReason::Error,
        }
    }
}

impl From<ProducerUpReason> for ProducerStatusReason {
    fn from(reason: ProducerUpReason) -> Self {
        match reason {
            ProducerUpReason::FirstRecoveryCompleted => ProducerStatusReason::FirstRecoveryCompleted,
            ProducerUpReason::ProcessingQueueDelayStabilized => {
                ProducerStatusReason::ProcessingQueueDelayStabilized
            }
            ProducerUpReason::ReturnedFromInactivity => ProducerStatusReason::ReturnedFromInactivity,
            ProducerUpReason::Default => ProducerStatusReason::Error,
        }
    }
}

/// Timestamps attached to every feed message (Unix millis)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageTimestamp {
    /// When the producer generated the message
    pub created: i64,
    /// When the producer handed it to the broker
    pub sent: i64,
    /// When this SDK received it
    pub received: i64,
    /// When this SDK published it to the user
    pub published: i64,
}

impl MessageTimestamp {
    /// All four fields set to the same instant (SDK-generated messages).
    pub fn uniform(at: i64) -> Self {
        Self {
            created: at,
            sent: at,
            received: at,
            published: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress_states() {
        assert!(RecoveryState::Started.is_in_progress());
        assert!(RecoveryState::Interrupted.is_in_progress());
        assert!(!RecoveryState::Default.is_in_progress());
        assert!(!RecoveryState::NotStarted.is_in_progress());
        assert!(!RecoveryState::Completed.is_in_progress());
        assert!(!RecoveryState::Error.is_in_progress());
    }

    #[test]
    fn test_down_reason_to_status_reason() {
        assert_eq!(
            ProducerStatusReason::from(ProducerDownReason::AliveIntervalViolation),
            ProducerStatusReason::AliveIntervalViolation
        );
        assert_eq!(
            ProducerStatusReason::from(ProducerDownReason::Default),
            ProducerStatusReason::Error
        );
    }

    #[test]
    fn test_up_reason_to_status_reason() {
        let reason: ProducerStatusReason = ProducerUpReason::ReturnedFromInactivity.into();
        assert_eq!(reason, ProducerStatusReason::ReturnedFromInactivity);
        assert_eq!(reason.code(), 3);
    }

    #[test]
    fn test_recovery_state_serialization() {
        let json = serde_json::to_string(&RecoveryState::Interrupted).unwrap();
        assert_eq!(json, "\"INTERRUPTED\"");
    }
}
