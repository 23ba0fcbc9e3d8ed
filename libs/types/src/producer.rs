//! Producer types
//!
//! A producer is one upstream source of odds messages. The feed describes
//! each producer once (`ProducerDescriptor`); the SDK layers runtime state on
//! top of it (enabled, flagged down, timing fields, last recovery attempt)
//! and hands out `Producer` snapshots of the combined record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ParseError;
use crate::ids::{ProducerId, RequestId};

/// Stateful recovery window of producers the feed never described
pub const UNKNOWN_PRODUCER_RECOVERY_WINDOW_MINUTES: u32 = 4320;

/// Which part of the event lifecycle a producer covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerScope {
    /// In-play events
    Live,
    /// Events that have not started yet
    Prematch,
}

impl fmt::Display for ProducerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerScope::Live => write!(f, "live"),
            ProducerScope::Prematch => write!(f, "prematch"),
        }
    }
}

impl FromStr for ProducerScope {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(ProducerScope::Live),
            "prematch" => Ok(ProducerScope::Prematch),
            other => Err(ParseError::UnknownScope {
                value: other.to_string(),
            }),
        }
    }
}

/// Producer description as published by the feed's producer list
///
/// `scope` is kept as raw text; it is only interpreted when a `Producer`
/// snapshot is built, so an unknown scope surfaces as an error at the
/// point of use rather than when the list is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerDescriptor {
    pub id: ProducerId,
    pub name: String,
    pub description: String,
    pub api_endpoint: String,
    pub active: bool,
    pub scope: String,
    pub stateful_recovery_window_minutes: u32,
}

impl ProducerDescriptor {
    /// Parse the raw scope text into the scopes this producer serves.
    pub fn scopes(&self) -> Result<Vec<ProducerScope>, ParseError> {
        self.scope
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ProducerScope::from_str)
            .collect()
    }
}

/// Record of the most recent full recovery attempt of a producer
///
/// One slot per producer, overwritten on every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryInfo {
    /// Anchor the replay was requested from (Unix millis, 0 = full snapshot)
    pub after: i64,
    /// When the request was issued (Unix millis)
    pub timestamp: i64,
    pub request_id: RequestId,
    /// Whether the REST trigger accepted the request
    pub successful: bool,
    pub node_id: Option<i32>,
}

/// Snapshot of a producer record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub id: ProducerId,
    pub name: String,
    pub description: String,
    pub api_endpoint: String,
    /// Whether the feed reports the producer as active
    pub active: bool,
    /// Whether the SDK user wants messages from this producer
    pub enabled: bool,
    pub flagged_down: bool,
    pub scopes: Vec<ProducerScope>,
    pub stateful_recovery_window_minutes: u32,
    pub last_message_timestamp: i64,
    pub last_processed_message_gen_timestamp: i64,
    pub last_alive_received_gen_timestamp: i64,
    pub recovery_from_timestamp: i64,
    pub last_recovery_info: Option<RecoveryInfo>,
}

impl Producer {
    /// Synthetic record for a producer id the feed never described.
    ///
    /// Serves both scopes so snapshot validation waits for both.
    pub fn unknown(id: ProducerId, api_endpoint: impl Into<String>) -> Self {
        Self {
            id,
            name: "unknown".to_string(),
            description: "unknown producer".to_string(),
            api_endpoint: api_endpoint.into(),
            active: true,
            enabled: true,
            flagged_down: true,
            scopes: vec![ProducerScope::Live, ProducerScope::Prematch],
            stateful_recovery_window_minutes: UNKNOWN_PRODUCER_RECOVERY_WINDOW_MINUTES,
            last_message_timestamp: 0,
            last_processed_message_gen_timestamp: 0,
            last_alive_received_gen_timestamp: 0,
            recovery_from_timestamp: 0,
            last_recovery_info: None,
        }
    }

    /// Anchor for the next recovery.
    ///
    /// The last alive generation timestamp seen while up; falls back to the
    /// user-configured recovery-from timestamp when no alive was recorded.
    pub fn timestamp_for_recovery(&self) -> i64 {
        if self.last_alive_received_gen_timestamp == 0 {
            self.recovery_from_timestamp
        } else {
            self.last_alive_received_gen_timestamp
        }
    }

    /// Milliseconds between the last processed message generation and `now`.
    pub fn processing_queue_delay(&self, now: i64) -> i64 {
        now - self.last_processed_message_gen_timestamp
    }

    pub fn serves(&self, scope: ProducerScope) -> bool {
        self.scopes.contains(&scope)
    }
}
