//! Per-producer recovery state
//!
//! One `ProducerRecoveryState` exists per producer id for the lifetime of
//! the `RecoveryManager`. It owns the current full recovery, every
//! in-flight event recovery and the alive timestamps used to judge
//! staleness. Producer flags and timing fields that other components read
//! live in the `ProducerDirectory` and are reached through it.
//!
//! The manager wraps each state in its own async mutex; every method here
//! takes `&self`/`&mut self` and never blocks.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{error, warn};

use types::ids::{ProducerId, RequestId, Urn};
use types::interest::MessageInterest;
use types::recovery::{ProducerDownReason, ProducerStatusReason, RecoveryState};

use crate::directory::ProducerDirectory;
use crate::error::DirectoryError;
use crate::recovery_data::{all_scopes_acknowledged, EventRecovery, RecoveryData};

pub struct ProducerRecoveryState {
    producer_id: ProducerId,
    directory: Arc<dyn ProducerDirectory>,

    current_recovery: Option<RecoveryData>,
    event_recoveries: HashMap<RequestId, EventRecovery>,

    /// Unix millis of the last system alive; `None` until one arrives.
    pub(crate) last_system_alive_received_timestamp: Option<i64>,
    /// Generation time of the last alive seen by a user session.
    pub(crate) last_user_session_alive_received_timestamp: i64,
    /// Generation time of the last alive seen while a recovery was Started.
    pub(crate) last_valid_alive_gen_timestamp_in_recovery: i64,

    pub(crate) recovery_state: RecoveryState,
    pub(crate) first_recovery_completed: bool,
    pub(crate) down_reason: ProducerDownReason,
    /// Reason of the last emitted status notification, for de-duplication.
    pub(crate) status_reason: Option<ProducerStatusReason>,
}

impl ProducerRecoveryState {
    pub fn new(producer_id: ProducerId, directory: Arc<dyn ProducerDirectory>) -> Self {
        Self {
            producer_id,
            directory,
            current_recovery: None,
            event_recoveries: HashMap::new(),
            last_system_alive_received_timestamp: None,
            last_user_session_alive_received_timestamp: 0,
            last_valid_alive_gen_timestamp_in_recovery: 0,
            recovery_state: RecoveryState::Default,
            first_recovery_completed: false,
            down_reason: ProducerDownReason::Default,
            status_reason: None,
        }
    }

    pub fn producer_id(&self) -> ProducerId {
        self.producer_id
    }

    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery_state
    }

    pub fn current_request_id(&self) -> Option<RequestId> {
        self.current_recovery.as_ref().map(|r| r.request_id)
    }

    pub fn first_recovery_completed(&self) -> bool {
        self.first_recovery_completed
    }

    pub fn down_reason(&self) -> ProducerDownReason {
        self.down_reason
    }

    pub fn event_recovery_count(&self) -> usize {
        self.event_recoveries.len()
    }

    pub fn is_performing_recovery(&self) -> bool {
        self.recovery_state.is_in_progress()
    }

    /// Down flag from the directory; a directory failure reads as down.
    pub fn is_flagged_down(&self) -> bool {
        self.directory.is_producer_down(self.producer_id).unwrap_or(true)
    }

    /// Enabled flag from the directory; a directory failure reads as disabled.
    pub fn is_disabled(&self) -> bool {
        !self.directory.is_producer_enabled(self.producer_id).unwrap_or(false)
    }

    /// Whether a snapshot-complete finishes the current full recovery.
    ///
    /// Scope-limited interests are accumulated; the recovery finishes only
    /// once every scope the producer serves has been acknowledged.
    pub fn validate_snapshot_complete(&mut self, request_id: RequestId, interest: MessageInterest) -> bool {
        if !self.is_performing_recovery() {
            return false;
        }

        let acknowledged = match self.current_recovery.as_mut() {
            Some(recovery) if recovery.request_id == request_id => {
                if !interest.needs_scope_validation() {
                    return true;
                }
                recovery.snapshot_complete(interest).clone()
            }
            _ => return false,
        };

        self.scopes_acknowledged(&acknowledged)
    }

    /// Same rule as `validate_snapshot_complete`, for an event recovery.
    pub fn validate_event_snapshot_complete(&mut self, request_id: RequestId, interest: MessageInterest) -> bool {
        let acknowledged = match self.event_recoveries.get_mut(&request_id) {
            None => return false,
            Some(_) if !interest.needs_scope_validation() => return true,
            Some(recovery) => recovery.data.snapshot_complete(interest).clone(),
        };

        self.scopes_acknowledged(&acknowledged)
    }

    fn scopes_acknowledged(&self, acknowledged: &BTreeSet<MessageInterest>) -> bool {
        match self.directory.get_producer(self.producer_id) {
            Ok(producer) => all_scopes_acknowledged(&producer.scopes, acknowledged),
            Err(e) => {
                error!(
                    producer_id = %self.producer_id,
                    error = %e,
                    "Snapshot complete validation failed"
                );
                false
            }
        }
    }

    /// Request id belongs to the current full recovery or an in-flight event recovery.
    pub fn is_known_recovery(&self, request_id: RequestId) -> bool {
        self.current_request_id() == Some(request_id) || self.event_recoveries.contains_key(&request_id)
    }

    pub fn event_recovery(&self, request_id: RequestId) -> Option<&EventRecovery> {
        self.event_recoveries.get(&request_id)
    }

    pub fn event_recovery_completed(&mut self, request_id: RequestId) {
        self.event_recoveries.remove(&request_id);
    }

    /// Insert or overwrite an event recovery.
    ///
    /// A zero request id together with a zero start time removes the entry
    /// keyed by zero instead.
    pub fn set_event_recovery_state(&mut self, event_id: Urn, request_id: RequestId, started_at: i64) {
        if request_id.is_zero() && started_at == 0 {
            self.event_recoveries.remove(&request_id);
        } else {
            self.event_recoveries
                .insert(request_id, EventRecovery::new(event_id, request_id, started_at));
        }
    }

    /// Start time of the current full recovery, `0` if none was started.
    pub fn last_recovery_started_at(&self) -> i64 {
        self.current_recovery.as_ref().map(|r| r.started_at).unwrap_or(0)
    }

    /// Replace the current full recovery record.
    pub fn set_recovery_state(&mut self, request_id: RequestId, started_at: i64, state: RecoveryState) {
        self.recovery_state = state;
        self.current_recovery = Some(RecoveryData::new(request_id, started_at));
    }

    pub fn interrupt_recovery(&mut self) {
        self.recovery_state = RecoveryState::Interrupted;
    }

    pub fn set_producer_down(&mut self, reason: ProducerDownReason) -> Result<(), DirectoryError> {
        self.directory.set_producer_down(self.producer_id, true)?;
        self.down_reason = reason;
        self.event_recoveries.clear();
        Ok(())
    }

    pub fn set_producer_up(&mut self) -> Result<(), DirectoryError> {
        self.directory.set_producer_down(self.producer_id, false)?;
        self.down_reason = ProducerDownReason::Default;
        Ok(())
    }

    /// Record a system alive.
    ///
    /// The generation timestamp becomes the next recovery anchor only while
    /// the producer is up; during a Started recovery it is also kept as the
    /// resume point should the recovery be interrupted.
    pub fn system_alive_received(&mut self, received_at: i64, generated_at: i64) -> Result<(), DirectoryError> {
        self.last_system_alive_received_timestamp = Some(received_at);
        if !self.is_flagged_down() {
            self.directory
                .set_last_alive_received_gen_timestamp(self.producer_id, generated_at)?;
        }
        if self.recovery_state == RecoveryState::Started {
            self.last_valid_alive_gen_timestamp_in_recovery = generated_at;
        }
        Ok(())
    }

    pub fn producer_name(&self) -> Result<String, DirectoryError> {
        Ok(self.directory.get_producer(self.producer_id)?.name)
    }

    pub fn timestamp_for_recovery(&self) -> Result<i64, DirectoryError> {
        Ok(self.directory.get_producer(self.producer_id)?.timestamp_for_recovery())
    }

    pub fn last_processed_message_gen_timestamp(&self) -> Result<i64, DirectoryError> {
        Ok(self
            .directory
            .get_producer(self.producer_id)?
            .last_processed_message_gen_timestamp)
    }

    pub fn set_last_message_received_timestamp(&self, timestamp: i64) -> Result<(), DirectoryError> {
        if timestamp == 0 {
            return Err(DirectoryError::ZeroTimestamp);
        }
        self.directory
            .set_producer_last_message_timestamp(self.producer_id, timestamp)
    }

    pub fn set_last_processed_message_gen_timestamp(&self, timestamp: i64) -> Result<(), DirectoryError> {
        if timestamp == 0 {
            warn!(producer_id = %self.producer_id, "Ignoring zero processed message timestamp");
            return Err(DirectoryError::ZeroTimestamp);
        }
        self.directory
            .set_last_processed_message_gen_timestamp(self.producer_id, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryProducerDirectory;
    use types::producer::ProducerDescriptor;

    fn descriptor(id: u32, scope: &str) -> ProducerDescriptor {
        ProducerDescriptor {
            id: ProducerId::new(id),
            name: format!("producer-{}", id),
            description: String::new(),
            api_endpoint: String::new(),
            active: true,
            scope: scope.to_string(),
            stateful_recovery_window_minutes: 60,
        }
    }

    fn state_for(scope: &str) -> (ProducerRecoveryState, Arc<InMemoryProducerDirectory>) {
        let directory = Arc::new(InMemoryProducerDirectory::new(vec![descriptor(1, scope)], ""));
        let state = ProducerRecoveryState::new(ProducerId::new(1), directory.clone());
        (state, directory)
    }

    fn started(scope: &str, request_id: u32) -> ProducerRecoveryState {
        let (mut state, _) = state_for(scope);
        state.set_recovery_state(RequestId::new(request_id), 1_000, RecoveryState::Started);
        state
    }

    #[test]
    fn test_performing_recovery_states() {
        let (mut state, _) = state_for("live");
        assert!(!state.is_performing_recovery());

        state.set_recovery_state(RequestId::new(1), 1, RecoveryState::Started);
        assert!(state.is_performing_recovery());

        state.interrupt_recovery();
        assert!(state.is_performing_recovery());

        state.set_recovery_state(RequestId::new(1), 1, RecoveryState::Completed);
        assert!(!state.is_performing_recovery());
    }

    #[test]
    fn test_validate_all_interest_first_call() {
        let mut state = started("live|prematch", 7);
        assert!(state.validate_snapshot_complete(RequestId::new(7), MessageInterest::All));
    }

    #[test]
    fn test_validate_rejects_other_request() {
        let mut state = started("live", 7);
        assert!(!state.validate_snapshot_complete(RequestId::new(8), MessageInterest::All));
    }

    #[test]
    fn test_validate_rejects_when_not_recovering() {
        let (mut state, _) = state_for("live");
        assert!(!state.validate_snapshot_complete(RequestId::new(7), MessageInterest::All));
    }

    #[test]
    fn test_validate_two_scope_producer() {
        let mut state = started("live|prematch", 7);
        assert!(!state.validate_snapshot_complete(RequestId::new(7), MessageInterest::LiveOnly));
        assert!(!state.validate_snapshot_complete(RequestId::new(7), MessageInterest::LiveOnly));
        assert!(state.validate_snapshot_complete(RequestId::new(7), MessageInterest::PrematchOnly));
    }

    #[test]
    fn test_validate_single_scope_producer() {
        let mut state = started("prematch", 7);
        assert!(!state.validate_snapshot_complete(RequestId::new(7), MessageInterest::LiveOnly));
        assert!(state.validate_snapshot_complete(RequestId::new(7), MessageInterest::PrematchOnly));
    }

    #[test]
    fn test_validate_unknown_scope_is_false() {
        let mut state = started("virtual", 7);
        assert!(!state.validate_snapshot_complete(RequestId::new(7), MessageInterest::LiveOnly));
        // Unscoped interests skip the scope lookup entirely
        assert!(state.validate_snapshot_complete(RequestId::new(7), MessageInterest::All));
    }

    #[test]
    fn test_event_snapshot_validation() {
        let (mut state, _) = state_for("live|prematch");
        state.set_event_recovery_state(Urn::match_id(3), RequestId::new(20), 500);

        assert!(!state.validate_event_snapshot_complete(RequestId::new(21), MessageInterest::All));
        assert!(!state.validate_event_snapshot_complete(RequestId::new(20), MessageInterest::PrematchOnly));
        assert!(state.validate_event_snapshot_complete(RequestId::new(20), MessageInterest::LiveOnly));
    }

    #[test]
    fn test_known_recovery_spans_both_id_spaces() {
        let mut state = started("live", 7);
        state.set_event_recovery_state(Urn::match_id(3), RequestId::new(20), 500);

        assert!(state.is_known_recovery(RequestId::new(7)));
        assert!(state.is_known_recovery(RequestId::new(20)));
        assert!(!state.is_known_recovery(RequestId::new(21)));
    }

    #[test]
    fn test_set_event_recovery_state_zero_removes() {
        let (mut state, _) = state_for("live");
        state.set_event_recovery_state(Urn::match_id(3), RequestId::new(20), 500);
        state.set_event_recovery_state(Urn::match_id(3), RequestId::ZERO, 0);
        assert_eq!(state.event_recovery_count(), 1);

        state.event_recovery_completed(RequestId::new(20));
        assert_eq!(state.event_recovery_count(), 0);
    }

    #[test]
    fn test_producer_down_clears_event_recoveries() {
        let (mut state, directory) = state_for("live");
        state.set_event_recovery_state(Urn::match_id(3), RequestId::new(20), 500);
        state.set_event_recovery_state(Urn::match_id(4), RequestId::new(21), 500);

        state
            .set_producer_down(ProducerDownReason::AliveIntervalViolation)
            .unwrap();

        assert_eq!(state.event_recovery_count(), 0);
        assert_eq!(state.down_reason(), ProducerDownReason::AliveIntervalViolation);
        assert!(directory.is_producer_down(ProducerId::new(1)).unwrap());

        state.set_producer_up().unwrap();
        assert_eq!(state.down_reason(), ProducerDownReason::Default);
        assert!(!state.is_flagged_down());
    }

    #[test]
    fn test_fail_safe_for_unknown_producer() {
        let directory = Arc::new(InMemoryProducerDirectory::new(Vec::new(), ""));
        let state = ProducerRecoveryState::new(ProducerId::new(99), directory);
        assert!(state.is_flagged_down());
        assert!(state.is_disabled());
    }

    #[test]
    fn test_system_alive_anchor_only_while_up() {
        let (mut state, directory) = state_for("live");

        state.set_recovery_state(RequestId::new(7), 1_000, RecoveryState::Started);
        state.system_alive_received(2_000, 1_900).unwrap();
        assert_eq!(state.last_system_alive_received_timestamp, Some(2_000));
        assert_eq!(state.last_valid_alive_gen_timestamp_in_recovery, 1_900);
        assert_eq!(
            directory
                .get_producer(ProducerId::new(1))
                .unwrap()
                .last_alive_received_gen_timestamp,
            0
        );

        state.set_producer_up().unwrap();
        state.set_recovery_state(RequestId::new(7), 1_000, RecoveryState::Completed);
        state.system_alive_received(3_000, 2_900).unwrap();
        assert_eq!(state.last_valid_alive_gen_timestamp_in_recovery, 1_900);
        assert_eq!(state.timestamp_for_recovery().unwrap(), 2_900);
    }

    #[test]
    fn test_zero_timestamps_rejected() {
        let (state, _) = state_for("live");
        assert_eq!(
            state.set_last_message_received_timestamp(0).unwrap_err(),
            DirectoryError::ZeroTimestamp
        );
        assert!(state.set_last_processed_message_gen_timestamp(0).is_err());
        state.set_last_processed_message_gen_timestamp(5).unwrap();
        assert_eq!(state.last_processed_message_gen_timestamp().unwrap(), 5);
    }
}
