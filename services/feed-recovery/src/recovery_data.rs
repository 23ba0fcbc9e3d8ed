//! In-flight recovery records
//!
//! A producer that spans several scopes answers one recovery request with
//! one snapshot-complete per scope-limited session. `RecoveryData` keeps the
//! interests acknowledged so far so completion can be judged once every
//! scope has answered.

use std::collections::BTreeSet;

use types::ids::{RequestId, Urn};
use types::interest::MessageInterest;
use types::producer::ProducerScope;

/// One full or event recovery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryData {
    pub request_id: RequestId,
    /// Unix millis when the request was issued
    pub started_at: i64,
    acknowledged: BTreeSet<MessageInterest>,
}

impl RecoveryData {
    pub fn new(request_id: RequestId, started_at: i64) -> Self {
        Self {
            request_id,
            started_at,
            acknowledged: BTreeSet::new(),
        }
    }

    /// Record a snapshot-complete under `interest` and return every interest
    /// acknowledged so far.
    pub fn snapshot_complete(&mut self, interest: MessageInterest) -> &BTreeSet<MessageInterest> {
        self.acknowledged.insert(interest);
        &self.acknowledged
    }

    pub fn acknowledged(&self) -> &BTreeSet<MessageInterest> {
        &self.acknowledged
    }
}

/// Replay of a single sport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecovery {
    pub data: RecoveryData,
    pub event_id: Urn,
}

impl EventRecovery {
    pub fn new(event_id: Urn, request_id: RequestId, started_at: i64) -> Self {
        Self {
            data: RecoveryData::new(request_id, started_at),
            event_id,
        }
    }
}

/// Whether the acknowledged interests cover every scope of a producer.
///
/// Each scope is satisfied once any acknowledged interest matches it; a
/// later unrelated acknowledgement never clears an earlier match.
pub fn all_scopes_acknowledged(
    scopes: &[ProducerScope],
    acknowledged: &BTreeSet<MessageInterest>,
) -> bool {
    scopes
        .iter()
        .all(|scope| acknowledged.iter().any(|interest| interest.scope() == Some(*scope)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_complete_accumulates() {
        let mut data = RecoveryData::new(RequestId::new(5), 1_000);
        assert_eq!(data.snapshot_complete(MessageInterest::LiveOnly).len(), 1);
        assert_eq!(data.snapshot_complete(MessageInterest::LiveOnly).len(), 1);
        let acked = data.snapshot_complete(MessageInterest::PrematchOnly);
        assert!(acked.contains(&MessageInterest::LiveOnly));
        assert!(acked.contains(&MessageInterest::PrematchOnly));
    }

    #[test]
    fn test_single_scope_producer() {
        let acked: BTreeSet<_> = [MessageInterest::LiveOnly].into_iter().collect();
        assert!(all_scopes_acknowledged(&[ProducerScope::Live], &acked));
        assert!(!all_scopes_acknowledged(&[ProducerScope::Prematch], &acked));
    }

    #[test]
    fn test_two_scope_producer_needs_both() {
        let scopes = [ProducerScope::Live, ProducerScope::Prematch];
        let mut acked = BTreeSet::new();

        acked.insert(MessageInterest::LiveOnly);
        assert!(!all_scopes_acknowledged(&scopes, &acked));

        acked.insert(MessageInterest::PrematchOnly);
        assert!(all_scopes_acknowledged(&scopes, &acked));
    }

    #[test]
    fn test_later_interest_does_not_reset_scope() {
        // Iteration visits PrematchOnly after LiveOnly; Live must stay satisfied
        let acked: BTreeSet<_> = [MessageInterest::LiveOnly, MessageInterest::PrematchOnly]
            .into_iter()
            .collect();
        assert!(all_scopes_acknowledged(&[ProducerScope::Live], &acked));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn interest() -> impl Strategy<Value = MessageInterest> {
            prop::sample::select(vec![
                MessageInterest::LiveOnly,
                MessageInterest::PrematchOnly,
                MessageInterest::HiPriorityOnly,
                MessageInterest::LowPriorityOnly,
                MessageInterest::SpecifiedMatchesOnly,
            ])
        }

        proptest! {
            #[test]
            fn completion_matches_scope_coverage(interests in prop::collection::vec(interest(), 0..12)) {
                let mut data = RecoveryData::new(RequestId::new(1), 0);
                let scopes = [ProducerScope::Live, ProducerScope::Prematch];

                for interest in &interests {
                    data.snapshot_complete(*interest);
                }

                let expected = interests.contains(&MessageInterest::LiveOnly)
                    && interests.contains(&MessageInterest::PrematchOnly);
                prop_assert_eq!(all_scopes_acknowledged(&scopes, data.acknowledged()), expected);
            }

            #[test]
            fn completion_is_monotonic(interests in prop::collection::vec(interest(), 1..12)) {
                let mut data = RecoveryData::new(RequestId::new(1), 0);
                let scopes = [ProducerScope::Live];
                let mut done = false;

                for interest in interests {
                    let now_done = all_scopes_acknowledged(&scopes, data.snapshot_complete(interest));
                    prop_assert!(!done || now_done);
                    done = now_done;
                }
            }
        }
    }

    #[test]
    fn test_event_recovery_carries_event() {
        let er = EventRecovery::new(Urn::match_id(9), RequestId::new(3), 42);
        assert_eq!(er.event_id.to_string(), "od:match:9");
        assert_eq!(er.data.request_id, RequestId::new(3));
        assert_eq!(er.data.started_at, 42);
    }
}
