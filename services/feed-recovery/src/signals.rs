//! Inbound recovery signals
//!
//! Session consumers classify each feed message once, into a `FeedSignal`,
//! and hand it to a `RecoveryMessageProcessor`. Replay sessions use
//! `NoopRecoveryProcessor` so replayed traffic never touches live producer
//! state.

use async_trait::async_trait;

use types::ids::{ProducerId, RequestId, SessionId, Urn};
use types::interest::MessageInterest;
use types::recovery::MessageTimestamp;

use crate::error::RecoveryError;
use crate::orchestrator::RecoveryManager;

/// Feed message as seen by the recovery subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSignal {
    /// Producer heartbeat
    Alive {
        producer: ProducerId,
        timestamp: MessageTimestamp,
        /// Whether this session is subscribed to the producer
        subscribed: bool,
    },
    /// End of a recovery replay
    SnapshotComplete {
        producer: ProducerId,
        request_id: RequestId,
    },
    /// Any other message, with its generation time (Unix millis)
    Message {
        producer: ProducerId,
        generated_at: i64,
    },
}

impl FeedSignal {
    pub fn producer(&self) -> ProducerId {
        match self {
            FeedSignal::Alive { producer, .. }
            | FeedSignal::SnapshotComplete { producer, .. }
            | FeedSignal::Message { producer, .. } => *producer,
        }
    }
}

/// The four entry points through which sessions report feed traffic.
#[async_trait]
pub trait RecoveryMessageProcessor: Send + Sync {
    async fn on_message_processing_started(&self, session: SessionId, producer: ProducerId, timestamp: i64);

    async fn on_message_processing_ended(&self, session: SessionId, producer: ProducerId, timestamp: i64);

    async fn on_alive_received(
        &self,
        producer: ProducerId,
        timestamp: MessageTimestamp,
        subscribed: bool,
        interest: MessageInterest,
    );

    async fn on_snapshot_complete_received(
        &self,
        producer: ProducerId,
        request_id: RequestId,
        interest: MessageInterest,
    );
}

/// User-facing single-event replay requests.
#[async_trait]
pub trait EventRecoveryInitiator: Send + Sync {
    async fn initiate_event_odds_messages_recovery(
        &self,
        producer: ProducerId,
        event_id: Urn,
    ) -> Result<RequestId, RecoveryError>;

    async fn initiate_event_stateful_messages_recovery(
        &self,
        producer: ProducerId,
        event_id: Urn,
    ) -> Result<RequestId, RecoveryError>;
}

/// Processor that ignores every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecoveryProcessor;

#[async_trait]
impl RecoveryMessageProcessor for NoopRecoveryProcessor {
    async fn on_message_processing_started(&self, _session: SessionId, _producer: ProducerId, _timestamp: i64) {}

    async fn on_message_processing_ended(&self, _session: SessionId, _producer: ProducerId, _timestamp: i64) {}

    async fn on_alive_received(
        &self,
        _producer: ProducerId,
        _timestamp: MessageTimestamp,
        _subscribed: bool,
        _interest: MessageInterest,
    ) {
    }

    async fn on_snapshot_complete_received(
        &self,
        _producer: ProducerId,
        _request_id: RequestId,
        _interest: MessageInterest,
    ) {
    }
}

#[async_trait]
impl RecoveryMessageProcessor for RecoveryManager {
    async fn on_message_processing_started(&self, session: SessionId, producer: ProducerId, timestamp: i64) {
        RecoveryManager::on_message_processing_started(self, session, producer, timestamp).await
    }

    async fn on_message_processing_ended(&self, session: SessionId, producer: ProducerId, timestamp: i64) {
        RecoveryManager::on_message_processing_ended(self, session, producer, timestamp).await
    }

    async fn on_alive_received(
        &self,
        producer: ProducerId,
        timestamp: MessageTimestamp,
        subscribed: bool,
        interest: MessageInterest,
    ) {
        RecoveryManager::on_alive_received(self, producer, timestamp, subscribed, interest).await
    }

    async fn on_snapshot_complete_received(
        &self,
        producer: ProducerId,
        request_id: RequestId,
        interest: MessageInterest,
    ) {
        RecoveryManager::on_snapshot_complete_received(self, producer, request_id, interest).await
    }
}

#[async_trait]
impl EventRecoveryInitiator for RecoveryManager {
    async fn initiate_event_odds_messages_recovery(
        &self,
        producer: ProducerId,
        event_id: Urn,
    ) -> Result<RequestId, RecoveryError> {
        RecoveryManager::initiate_event_odds_messages_recovery(self, producer, event_id).await
    }

    async fn initiate_event_stateful_messages_recovery(
        &self,
        producer: ProducerId,
        event_id: Urn,
    ) -> Result<RequestId, RecoveryError> {
        RecoveryManager::initiate_event_stateful_messages_recovery(self, producer, event_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_producer() {
        let producer = ProducerId::new(3);
        let signals = [
            FeedSignal::Alive {
                producer,
                timestamp: MessageTimestamp::uniform(1),
                subscribed: true,
            },
            FeedSignal::SnapshotComplete {
                producer,
                request_id: RequestId::new(2),
            },
            FeedSignal::Message {
                producer,
                generated_at: 5,
            },
        ];
        assert!(signals.iter().all(|s| s.producer() == producer));
    }

    #[tokio::test]
    async fn test_noop_processor_accepts_everything() {
        let processor: Box<dyn RecoveryMessageProcessor> = Box::new(NoopRecoveryProcessor);
        let session = SessionId::new();
        let producer = ProducerId::new(1);

        processor
            .on_message_processing_started(session, producer, 10)
            .await;
        processor
            .on_alive_received(producer, MessageTimestamp::uniform(10), false, MessageInterest::SystemAliveOnly)
            .await;
        processor
            .on_snapshot_complete_received(producer, RequestId::new(1), MessageInterest::All)
            .await;
        processor
            .on_message_processing_ended(session, producer, 10)
            .await;
    }
}
