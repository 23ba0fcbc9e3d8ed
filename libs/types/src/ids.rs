//! Identifier types for feed entities
//!
//! Producer and request ids are small integers assigned by the feed and by
//! the recovery generator respectively. Sessions use UUID v7 so ids sort by
//! creation time in logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ParseError;

/// Identifier of an upstream producer (e.g. 1 = live odds, 3 = prematch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProducerId(u32);

impl ProducerId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProducerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Correlation id of a recovery request
///
/// Echoed back by the feed on every message that belongs to the replay,
/// including the terminating snapshot-complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u32);

impl RequestId {
    pub const ZERO: RequestId = RequestId(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RequestId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier of one consumer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new SessionId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniform resource name of a feed entity
///
/// Format: "prefix:kind:id" (e.g. "od:match:1234")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Urn {
    pub prefix: String,
    pub kind: String,
    pub id: u64,
}

impl Urn {
    pub fn new(prefix: impl Into<String>, kind: impl Into<String>, id: u64) -> Self {
        Self {
            prefix: prefix.into(),
            kind: kind.into(),
            id,
        }
    }

    /// Shorthand for a match URN with the default "od" prefix
    pub fn match_id(id: u64) -> Self {
        Self::new("od", "match", id)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.kind, self.id)
    }
}

impl FromStr for Urn {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [prefix, kind, id] if !prefix.is_empty() && !kind.is_empty() => {
                let id = id.parse::<u64>().map_err(|e| ParseError::InvalidUrnId {
                    value: s.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Self::new(*prefix, *kind, id))
            }
            _ => Err(ParseError::InvalidUrn {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Urn {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.to_string()
    }
}
