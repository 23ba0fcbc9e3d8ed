//! Recovery Orchestrator
//!
//! `RecoveryManager` owns one `ProducerRecoveryState` per producer and
//! decides when a producer goes down or up and when a replay is requested.
//!
//! Inputs:
//! - the four `on_*` signals from session consumers
//! - user-initiated event recoveries
//! - the periodic health check
//!
//! Output: a single bounded stream of `RecoveryMessage`.
//!
//! Each producer state sits behind its own async mutex. Signals for one
//! producer are handled strictly in arrival order while other producers
//! proceed independently; the producer map itself is only touched for
//! lookups and never held across an await.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use dashmap::DashMap;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use types::ids::{ProducerId, RequestId, SessionId, Urn};
use types::interest::MessageInterest;
use types::producer::RecoveryInfo;
use types::recovery::{
    MessageTimestamp, ProducerDownReason, ProducerStatusReason, ProducerUpReason, RecoveryState,
};

use crate::clock::Clock;
use crate::config::RecoveryConfig;
use crate::directory::ProducerDirectory;
use crate::error::{ConfigError, RecoveryError};
use crate::generator::RequestIdGenerator;
use crate::messages::{EventRecoveryMessage, ProducerStatus, RecoveryMessage};
use crate::signals::FeedSignal;
use crate::state::ProducerRecoveryState;
use crate::transport::RecoveryTransport;

/// Processing of a single message longer than this is logged.
const SLOW_PROCESSING_MILLIS: i64 = 1_000;

type SharedState = Arc<Mutex<ProducerRecoveryState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Open,
    Closed,
}

struct Lifecycle {
    phase: Phase,
    sender: Option<mpsc::Sender<RecoveryMessage>>,
    health_loop: Option<JoinHandle<()>>,
}

/// Which replay an event recovery requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRecoveryKind {
    Odds,
    Stateful,
}

impl EventRecoveryKind {
    fn label(&self) -> &'static str {
        match self {
            EventRecoveryKind::Odds => "odds",
            EventRecoveryKind::Stateful => "stateful",
        }
    }
}

/// A full recovery claimed under the producer lock.
///
/// The request itself goes out after the lock is released.
#[derive(Debug)]
struct PendingRecovery {
    producer_id: ProducerId,
    producer_name: String,
    request_id: RequestId,
    after: i64,
    requested_at: i64,
}

/// Point-in-time view of one producer's recovery bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryStatus {
    pub producer_id: ProducerId,
    pub recovery_state: RecoveryState,
    pub current_request_id: Option<RequestId>,
    pub event_recoveries: usize,
    pub first_recovery_completed: bool,
    pub down_reason: ProducerDownReason,
}

pub struct RecoveryManager {
    config: RecoveryConfig,
    directory: Arc<dyn ProducerDirectory>,
    transport: Arc<dyn RecoveryTransport>,
    clock: Arc<dyn Clock>,
    generator: RequestIdGenerator,

    producers: DashMap<ProducerId, SharedState>,
    /// Start time of the message each session is currently processing.
    processing_times: DashMap<SessionId, i64>,

    lifecycle: StdMutex<Lifecycle>,
    shutdown: watch::Sender<bool>,
}

impl RecoveryManager {
    pub fn new(
        config: RecoveryConfig,
        directory: Arc<dyn ProducerDirectory>,
        transport: Arc<dyn RecoveryTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            directory,
            transport,
            clock,
            generator: RequestIdGenerator::default(),
            producers: DashMap::new(),
            processing_times: DashMap::new(),
            lifecycle: StdMutex::new(Lifecycle {
                phase: Phase::Created,
                sender: None,
                health_loop: None,
            }),
            shutdown,
        })
    }

    /// Replace the request id sequence (deterministic ids in tests).
    pub fn with_generator(mut self, generator: RequestIdGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle().phase == Phase::Open
    }

    /// Start recovery tracking and return the notification stream.
    ///
    /// Creates a recovery state for every active producer and spawns the
    /// health check loop. A manager opens once; reopening after `close`
    /// fails with `RecoveryError::Closed`.
    pub fn open(self: &Arc<Self>) -> Result<mpsc::Receiver<RecoveryMessage>, RecoveryError> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.phase {
            Phase::Open => return Err(RecoveryError::AlreadyOpened),
            Phase::Closed => return Err(RecoveryError::Closed),
            Phase::Created => {}
        }

        let producers = self.directory.active_producers()?;
        if producers.is_empty() {
            warn!("No active producers");
        }
        for id in producers.keys() {
            self.find_or_create_state(*id);
        }

        let (sender, receiver) = mpsc::channel(self.config.message_channel_capacity);
        lifecycle.sender = Some(sender);
        lifecycle.health_loop = Some(self.spawn_health_loop());
        lifecycle.phase = Phase::Open;

        info!(
            producers = producers.len(),
            max_inactivity_secs = self.config.max_inactivity_seconds,
            "Recovery manager opened"
        );
        Ok(receiver)
    }

    /// Stop the health check loop and end the notification stream.
    ///
    /// Safe to call repeatedly. Notifications blocked on a full channel are
    /// abandoned.
    pub async fn close(&self) {
        let health_loop = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.phase == Phase::Closed {
                return;
            }
            lifecycle.phase = Phase::Closed;
            lifecycle.sender = None;
            lifecycle.health_loop.take()
        };

        self.shutdown.send_replace(true);

        if let Some(handle) = health_loop {
            if let Err(e) = handle.await {
                error!(error = %e, "Health check loop terminated abnormally");
            }
        }

        info!("Recovery manager closed");
    }

    fn spawn_health_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let shutdown = self.shutdown.subscribe();
        let initial_delay = self.config.initial_delay();
        let period = self.config.tick_period();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(initial_delay) => {}
                _ = shutdown_signalled(shutdown.clone()) => return,
            }

            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(manager) = weak.upgrade() else { break };
                        manager.run_health_check().await;
                    }
                    _ = shutdown_signalled(shutdown.clone()) => break,
                }
            }

            debug!("Health check loop stopped");
        })
    }

    fn find_or_create_state(&self, producer_id: ProducerId) -> SharedState {
        self.producers
            .entry(producer_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(ProducerRecoveryState::new(
                    producer_id,
                    self.directory.clone(),
                )))
            })
            .value()
            .clone()
    }

    fn find_state(&self, producer_id: ProducerId) -> Option<SharedState> {
        self.producers.get(&producer_id).map(|entry| entry.value().clone())
    }

    /// Snapshot of the recovery bookkeeping of one producer.
    pub async fn recovery_status(&self, producer_id: ProducerId) -> Option<RecoveryStatus> {
        let shared = self.find_state(producer_id)?;
        let state = shared.lock().await;
        Some(RecoveryStatus {
            producer_id,
            recovery_state: state.recovery_state(),
            current_request_id: state.current_request_id(),
            event_recoveries: state.event_recovery_count(),
            first_recovery_completed: state.first_recovery_completed(),
            down_reason: state.down_reason(),
        })
    }

    // ------------------------------------------------------------------
    // Inbound signals
    // ------------------------------------------------------------------

    pub async fn on_message_processing_started(&self, session: SessionId, producer_id: ProducerId, timestamp: i64) {
        self.processing_times.insert(session, timestamp);

        let shared = self.find_or_create_state(producer_id);
        let state = shared.lock().await;
        if let Err(e) = state.set_last_message_received_timestamp(timestamp) {
            error!(producer_id = %producer_id, error = %e, "Failed to set last message received timestamp");
        }
    }

    pub async fn on_message_processing_ended(&self, session: SessionId, producer_id: ProducerId, timestamp: i64) {
        if timestamp != 0 {
            let shared = self.find_or_create_state(producer_id);
            let state = shared.lock().await;
            if let Err(e) = state.set_last_processed_message_gen_timestamp(timestamp) {
                error!(producer_id = %producer_id, error = %e, "Failed to set processed message gen timestamp");
            }
        }

        match self.processing_times.remove(&session) {
            None | Some((_, 0)) => warn!(session = %session, "Message processing ended, but was not started"),
            Some((_, started)) => {
                let elapsed = self.clock.now_millis() - started;
                if elapsed > SLOW_PROCESSING_MILLIS {
                    warn!(session = %session, elapsed_ms = elapsed, "Processing message took more than 1s");
                }
            }
        }
    }

    pub async fn on_alive_received(
        &self,
        producer_id: ProducerId,
        timestamp: MessageTimestamp,
        subscribed: bool,
        interest: MessageInterest,
    ) {
        let shared = self.find_or_create_state(producer_id);
        let pending = {
            let mut state = shared.lock().await;
            if state.is_disabled() {
                return;
            }

            if interest == MessageInterest::SystemAliveOnly {
                match self.system_alive_received(&mut state, timestamp, subscribed).await {
                    Ok(pending) => pending,
                    Err(e) => {
                        error!(producer_id = %producer_id, error = %e, "Failed to handle system alive");
                        None
                    }
                }
            } else {
                state.last_user_session_alive_received_timestamp = timestamp.created;
                None
            }
        };

        if let Some(pending) = pending {
            self.trigger_snapshot_recovery(pending).await;
        }
    }

    pub async fn on_snapshot_complete_received(
        &self,
        producer_id: ProducerId,
        request_id: RequestId,
        interest: MessageInterest,
    ) {
        let Some(shared) = self.find_state(producer_id) else {
            return;
        };

        let pending = {
            let mut state = shared.lock().await;

            if state.is_disabled() {
                info!(producer_id = %producer_id, request_id = %request_id, "Snapshot complete for disabled producer");
                None
            } else if !state.is_known_recovery(request_id) {
                info!(producer_id = %producer_id, request_id = %request_id, "Unknown snapshot complete received");
                None
            } else if state.validate_event_snapshot_complete(request_id, interest) {
                if let Err(e) = self.event_recovery_finished(&mut state, request_id).await {
                    error!(producer_id = %producer_id, error = %e, "Event recovery finish failed");
                }
                None
            } else if state.validate_snapshot_complete(request_id, interest) {
                self.snapshot_recovery_finished(&mut state, request_id)
                    .await
                    .unwrap_or_else(|e| {
                        error!(producer_id = %producer_id, error = %e, "Snapshot recovery finish failed");
                        None
                    })
            } else {
                None
            }
        };

        if let Some(pending) = pending {
            self.trigger_snapshot_recovery(pending).await;
        }
    }

    /// Run one feed message through the recovery bookkeeping.
    ///
    /// Brackets the matching `on_*` handler with processing started/ended.
    pub async fn dispatch(&self, session: SessionId, interest: MessageInterest, signal: FeedSignal) {
        let producer_id = signal.producer();
        let received_at = self.clock.now_millis();
        self.on_message_processing_started(session, producer_id, received_at)
            .await;

        let generated_at = match signal {
            FeedSignal::Alive {
                producer,
                timestamp,
                subscribed,
            } => {
                self.on_alive_received(producer, timestamp, subscribed, interest)
                    .await;
                timestamp.created
            }
            FeedSignal::SnapshotComplete { producer, request_id } => {
                self.on_snapshot_complete_received(producer, request_id, interest)
                    .await;
                0
            }
            FeedSignal::Message { generated_at, .. } => generated_at,
        };

        self.on_message_processing_ended(session, producer_id, generated_at)
            .await;
    }

    // ------------------------------------------------------------------
    // Event recovery
    // ------------------------------------------------------------------

    pub async fn initiate_event_odds_messages_recovery(
        &self,
        producer_id: ProducerId,
        event_id: Urn,
    ) -> Result<RequestId, RecoveryError> {
        self.make_event_recovery(producer_id, event_id, EventRecoveryKind::Odds)
            .await
    }

    pub async fn initiate_event_stateful_messages_recovery(
        &self,
        producer_id: ProducerId,
        event_id: Urn,
    ) -> Result<RequestId, RecoveryError> {
        self.make_event_recovery(producer_id, event_id, EventRecoveryKind::Stateful)
            .await
    }

    /// Register an event recovery and trigger it.
    ///
    /// The entry exists before the request goes out so a fast
    /// snapshot-complete is still recognized. The producer lock is released
    /// for the duration of the call.
    async fn make_event_recovery(
        &self,
        producer_id: ProducerId,
        event_id: Urn,
        kind: EventRecoveryKind,
    ) -> Result<RequestId, RecoveryError> {
        let shared = self.find_or_create_state(producer_id);
        let request_id = self.generator.next();

        let producer_name = {
            let mut state = shared.lock().await;
            state.set_event_recovery_state(event_id.clone(), request_id, self.clock.now_millis());
            match state.producer_name() {
                Ok(name) => name,
                Err(e) => {
                    state.event_recovery_completed(request_id);
                    return Err(e.into());
                }
            }
        };

        info!(
            producer_id = %producer_id,
            request_id = %request_id,
            event_id = %event_id,
            kind = kind.label(),
            "Requesting event recovery"
        );

        let node_id = self.config.sdk_node_id;
        let result = match kind {
            EventRecoveryKind::Odds => {
                self.transport
                    .post_event_odds_recovery(&producer_name, &event_id, request_id, node_id)
                    .await
            }
            EventRecoveryKind::Stateful => {
                self.transport
                    .post_event_stateful_recovery(&producer_name, &event_id, request_id, node_id)
                    .await
            }
        };

        match result {
            Ok(()) => Ok(request_id),
            Err(source) => {
                error!(
                    producer_id = %producer_id,
                    request_id = %request_id,
                    error = %source,
                    "Event recovery request failed"
                );
                shared.lock().await.event_recovery_completed(request_id);
                Err(RecoveryError::EventRecoveryFailed { request_id, source })
            }
        }
    }

    async fn event_recovery_finished(
        &self,
        state: &mut ProducerRecoveryState,
        request_id: RequestId,
    ) -> Result<(), RecoveryError> {
        let producer_id = state.producer_id();
        let event_id = state
            .event_recovery(request_id)
            .map(|recovery| recovery.event_id.clone())
            .ok_or(RecoveryError::InconsistentState {
                producer_id,
                request_id,
            })?;

        let producer = self.directory.get_producer(producer_id)?;
        info!(producer_id = %producer_id, request_id = %request_id, event_id = %event_id, "Event recovery finished");

        self.emit(EventRecoveryMessage {
            producer,
            timestamp: MessageTimestamp::uniform(self.clock.now_millis()),
            event_id,
            request_id,
        })
        .await;

        state.event_recovery_completed(request_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Health check
    // ------------------------------------------------------------------

    /// One pass of the periodic producer health check.
    pub async fn run_health_check(&self) {
        let states: Vec<SharedState> = self.producers.iter().map(|entry| entry.value().clone()).collect();
        let max_inactivity = self.config.max_inactivity_millis();

        for shared in states {
            let mut state = shared.lock().await;
            if state.is_disabled() {
                continue;
            }

            let now = self.clock.now_millis();
            let alive_gap = now - state.last_system_alive_received_timestamp.unwrap_or(0);

            let reason = if alive_gap > max_inactivity {
                Some(ProducerDownReason::AliveIntervalViolation)
            } else if !self.timing_within_limits(&state, now) {
                Some(ProducerDownReason::ProcessingQueueDelayViolation)
            } else {
                None
            };

            if let Some(reason) = reason {
                if let Err(e) = self.producer_down(&mut state, reason).await {
                    error!(producer_id = %state.producer_id(), error = %e, "Failed to mark producer down");
                }
            }
        }
    }

    /// Processing and user-session alives both lag less than the
    /// inactivity limit.
    fn timing_within_limits(&self, state: &ProducerRecoveryState, now: i64) -> bool {
        let max_inactivity = self.config.max_inactivity_millis();
        let last_processed = match state.last_processed_message_gen_timestamp() {
            Ok(ts) => ts,
            Err(e) => {
                error!(producer_id = %state.producer_id(), error = %e, "Failed to read processing timestamp");
                return false;
            }
        };

        now - last_processed < max_inactivity
            && now - state.last_user_session_alive_received_timestamp < max_inactivity
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    async fn producer_down(
        &self,
        state: &mut ProducerRecoveryState,
        reason: ProducerDownReason,
    ) -> Result<(), RecoveryError> {
        if state.is_disabled() {
            return Ok(());
        }

        let flagged_down = state.is_flagged_down();
        if flagged_down && state.down_reason() != reason {
            info!(
                producer_id = %state.producer_id(),
                previous = ?state.down_reason(),
                reason = ?reason,
                "Changing producer down reason"
            );
            state.set_producer_down(reason)?;
        }

        if state.recovery_state() == RecoveryState::Started
            && reason != ProducerDownReason::ProcessingQueueDelayViolation
        {
            info!(producer_id = %state.producer_id(), "Interrupting recovery");
            state.interrupt_recovery();
        }

        if !flagged_down {
            state.set_producer_down(reason)?;
        }

        self.notify(state, reason.into()).await
    }

    async fn producer_up(
        &self,
        state: &mut ProducerRecoveryState,
        reason: ProducerUpReason,
    ) -> Result<(), RecoveryError> {
        if state.is_disabled() {
            return Ok(());
        }

        if state.is_flagged_down() {
            state.set_producer_up()?;
        }

        self.notify(state, reason.into()).await
    }

    /// Emit a producer status unless the reason repeats the last one sent.
    async fn notify(
        &self,
        state: &mut ProducerRecoveryState,
        reason: ProducerStatusReason,
    ) -> Result<(), RecoveryError> {
        if state.status_reason == Some(reason) {
            return Ok(());
        }
        state.status_reason = Some(reason);

        let producer_id = state.producer_id();
        let producer = self.directory.get_producer(producer_id)?;
        let now = self.clock.now_millis();
        let status = ProducerStatus {
            producer,
            timestamp: MessageTimestamp::uniform(now),
            is_down: state.is_flagged_down(),
            is_delayed: !self.timing_within_limits(state, now),
            reason,
        };

        info!(
            producer_id = %producer_id,
            is_down = status.is_down,
            is_delayed = status.is_delayed,
            reason = ?reason,
            "Producer status changed"
        );

        self.emit(status).await;
        Ok(())
    }

    async fn system_alive_received(
        &self,
        state: &mut ProducerRecoveryState,
        timestamp: MessageTimestamp,
        subscribed: bool,
    ) -> Result<Option<PendingRecovery>, RecoveryError> {
        state.set_last_message_received_timestamp(timestamp.received)?;
        let recover_from = state.timestamp_for_recovery()?;
        let mut pending = None;

        if !subscribed {
            if !state.is_flagged_down() {
                self.producer_down(state, ProducerDownReason::Other).await?;
            }
            pending = self.begin_snapshot_recovery(state, recover_from)?;
        } else if self.is_back_from_inactivity(state) {
            self.producer_up(state, ProducerUpReason::ReturnedFromInactivity)
                .await?;
        } else if is_in_recovery(state.recovery_state()) {
            if state.is_flagged_down()
                && !state.is_performing_recovery()
                && state.down_reason() != ProducerDownReason::ProcessingQueueDelayViolation
            {
                pending = self.begin_snapshot_recovery(state, recover_from)?;
            }

            let now = self.clock.now_millis();
            let running_for = now - state.last_recovery_started_at();
            if state.is_performing_recovery() && running_for > self.config.max_recovery_execution_millis() {
                warn!(
                    producer_id = %state.producer_id(),
                    request_id = ?state.current_request_id(),
                    running_ms = running_for,
                    "Recovery exceeded max execution time, restarting"
                );
                state.set_recovery_state(RequestId::ZERO, 0, RecoveryState::Error);
                pending = self.begin_snapshot_recovery(state, recover_from)?;
            }
        } else {
            pending = self.begin_snapshot_recovery(state, recover_from)?;
        }

        // A claimed recovery is still triggered if the alive bookkeeping fails.
        if let Err(e) = state.system_alive_received(timestamp.received, timestamp.created) {
            error!(producer_id = %state.producer_id(), error = %e, "Failed to record system alive");
        }
        Ok(pending)
    }

    fn is_back_from_inactivity(&self, state: &ProducerRecoveryState) -> bool {
        state.is_flagged_down()
            && !state.is_performing_recovery()
            && state.down_reason() == ProducerDownReason::ProcessingQueueDelayViolation
            && self.timing_within_limits(state, self.clock.now_millis())
    }

    /// Claim a full replay of the producer since `anchor`.
    ///
    /// Marks the recovery started under the caller's lock so a fast
    /// snapshot-complete is recognized; `trigger_snapshot_recovery` sends it.
    fn begin_snapshot_recovery(
        &self,
        state: &mut ProducerRecoveryState,
        anchor: i64,
    ) -> Result<Option<PendingRecovery>, RecoveryError> {
        if !self.is_open() {
            return Ok(None);
        }

        let now = self.clock.now_millis();
        let max_execution = self.config.max_recovery_execution_millis();
        let after = if anchor != 0 && now - anchor > max_execution {
            now - max_execution
        } else {
            anchor
        };

        let producer_id = state.producer_id();
        let request_id = self.generator.next();
        let producer_name = state.producer_name()?;
        state.set_recovery_state(request_id, now, RecoveryState::Started);

        info!(
            producer_id = %producer_id,
            producer = %producer_name,
            request_id = %request_id,
            after,
            "Recovery started"
        );

        Ok(Some(PendingRecovery {
            producer_id,
            producer_name,
            request_id,
            after,
            requested_at: now,
        }))
    }

    /// Send a claimed recovery request. Must run without the producer lock.
    ///
    /// The attempt is recorded in the directory whether or not the trigger
    /// succeeds; a failed trigger is retried by later alives or the watchdog.
    async fn trigger_snapshot_recovery(&self, pending: PendingRecovery) {
        let PendingRecovery {
            producer_id,
            producer_name,
            request_id,
            after,
            requested_at,
        } = pending;

        let node_id = self.config.sdk_node_id;
        let result = self
            .transport
            .post_recovery(&producer_name, request_id, node_id, after)
            .await;
        if let Err(e) = &result {
            error!(producer_id = %producer_id, request_id = %request_id, error = %e, "Recovery request failed");
        }

        let info = RecoveryInfo {
            after,
            timestamp: requested_at,
            request_id,
            successful: result.is_ok(),
            node_id,
        };
        if let Err(e) = self.directory.set_producer_recovery_info(producer_id, info) {
            error!(producer_id = %producer_id, request_id = %request_id, error = %e, "Failed to record recovery info");
        }
    }

    async fn snapshot_recovery_finished(
        &self,
        state: &mut ProducerRecoveryState,
        request_id: RequestId,
    ) -> Result<Option<PendingRecovery>, RecoveryError> {
        let producer_id = state.producer_id();
        let started_at = state.last_recovery_started_at();
        if started_at == 0 {
            return Err(RecoveryError::InconsistentState {
                producer_id,
                request_id,
            });
        }

        info!(
            producer_id = %producer_id,
            request_id = %request_id,
            duration_ms = self.clock.now_millis() - started_at,
            "Recovery finished"
        );

        if state.recovery_state() == RecoveryState::Interrupted {
            let resume_from = state.last_valid_alive_gen_timestamp_in_recovery;
            info!(producer_id = %producer_id, after = resume_from, "Recovery was interrupted, resuming");
            return self.begin_snapshot_recovery(state, resume_from);
        }

        let reason = if state.first_recovery_completed {
            ProducerUpReason::ReturnedFromInactivity
        } else {
            ProducerUpReason::FirstRecoveryCompleted
        };
        state.first_recovery_completed = true;
        state.set_recovery_state(request_id, started_at, RecoveryState::Completed);

        self.producer_up(state, reason).await?;
        Ok(None)
    }

    /// Send a notification downstream, waiting for channel capacity.
    async fn emit(&self, message: impl Into<RecoveryMessage>) {
        let message = message.into();
        let Some(sender) = self.lifecycle().sender.clone() else {
            debug!(message = message.type_label(), "Recovery manager not open, dropping message");
            return;
        };

        tokio::select! {
            result = sender.send(message) => {
                if result.is_err() {
                    warn!("Recovery message receiver dropped");
                }
            }
            _ = shutdown_signalled(self.shutdown.subscribe()) => {
                debug!("Recovery manager closing, abandoning message");
            }
        }
    }
}

/// Resolves once shutdown has been requested, including before this call.
async fn shutdown_signalled(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Recovery has not been reset, interrupted or failed.
///
/// `Default` counts as in recovery even though no request was issued yet.
fn is_in_recovery(state: RecoveryState) -> bool {
    !matches!(
        state,
        RecoveryState::NotStarted | RecoveryState::Error | RecoveryState::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_in_recovery() {
        assert!(is_in_recovery(RecoveryState::Default));
        assert!(is_in_recovery(RecoveryState::Started));
        assert!(is_in_recovery(RecoveryState::Completed));
        assert!(!is_in_recovery(RecoveryState::NotStarted));
        assert!(!is_in_recovery(RecoveryState::Error));
        assert!(!is_in_recovery(RecoveryState::Interrupted));
    }

    #[test]
    fn test_event_recovery_kind_label() {
        assert_eq!(EventRecoveryKind::Odds.label(), "odds");
        assert_eq!(EventRecoveryKind::Stateful.label(), "stateful");
    }
}
