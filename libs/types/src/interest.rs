//! Message interests
//!
//! A message interest is the routing key filter a session binds with. It
//! decides which slice of the feed the session receives and, for recovery,
//! which snapshot-complete acknowledgements are needed before a replay
//! counts as finished.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::ParseError;
use crate::ids::ProducerId;
use crate::producer::{Producer, ProducerScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageInterest {
    LiveOnly,
    PrematchOnly,
    HiPriorityOnly,
    LowPriorityOnly,
    SpecifiedMatchesOnly,
    All,
    /// System session bound only to alive heartbeats
    SystemAliveOnly,
}

impl MessageInterest {
    /// Routing key pattern bound on the exchange.
    pub fn routing_key(&self) -> &'static str {
        match self {
            MessageInterest::LiveOnly => "*.*.live.*.*.*.*",
            MessageInterest::PrematchOnly => "*.pre.*.*.*.*.*",
            MessageInterest::HiPriorityOnly => "hi.*.*.*.*.*.*",
            MessageInterest::LowPriorityOnly => "lo.*.*.*.*.*.*",
            MessageInterest::SpecifiedMatchesOnly => "",
            MessageInterest::All => "*.*.*.*.*.*.*",
            MessageInterest::SystemAliveOnly => "-.-.-.alive.#",
        }
    }

    /// Scope this interest acknowledges on its own, if it is scope-limited.
    pub fn scope(&self) -> Option<ProducerScope> {
        match self {
            MessageInterest::LiveOnly => Some(ProducerScope::Live),
            MessageInterest::PrematchOnly => Some(ProducerScope::Prematch),
            _ => None,
        }
    }

    /// Whether a snapshot-complete under this interest only covers part of
    /// a producer and has to be matched against its scopes.
    pub fn needs_scope_validation(&self) -> bool {
        self.scope().is_some()
    }

    pub fn is_producer_in_scope(&self, producer: &Producer) -> bool {
        match self.scope() {
            Some(scope) => producer.serves(scope),
            None => true,
        }
    }

    /// Ids of the producers a session with this interest can receive from.
    pub fn possible_source_producers(
        &self,
        producers: &BTreeMap<ProducerId, Producer>,
    ) -> Vec<ProducerId> {
        producers
            .values()
            .filter(|p| self.is_producer_in_scope(p))
            .map(|p| p.id)
            .collect()
    }
}

impl fmt::Display for MessageInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.routing_key())
    }
}

impl FromStr for MessageInterest {
    type Err = ParseError;

    /// Parse a routing key pattern back into an interest.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [MessageInterest; 7] = [
            MessageInterest::LiveOnly,
            MessageInterest::PrematchOnly,
            MessageInterest::HiPriorityOnly,
            MessageInterest::LowPriorityOnly,
            MessageInterest::SpecifiedMatchesOnly,
            MessageInterest::All,
            MessageInterest::SystemAliveOnly,
        ];
        ALL.into_iter()
            .find(|i| i.routing_key() == s)
            .ok_or_else(|| ParseError::UnknownInterest {
                value: s.to_string(),
            })
    }
}
