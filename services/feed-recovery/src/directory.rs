//! Producer directory
//!
//! Shared record of every producer: what the feed says about it plus the
//! runtime flags and timing fields the recovery subsystem maintains. The
//! recovery core only talks to the narrow `ProducerDirectory` trait; each
//! accessor returns an owned snapshot or an explicit error, never a
//! reference into shared state.

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::debug;

use types::ids::ProducerId;
use types::producer::{Producer, ProducerDescriptor, ProducerScope, RecoveryInfo};

use crate::error::DirectoryError;

/// Narrow read/write interface onto the producer records.
pub trait ProducerDirectory: Send + Sync {
    /// Snapshot of a producer. Ids the feed never described yield a
    /// synthetic "unknown" producer rather than an error.
    fn get_producer(&self, id: ProducerId) -> Result<Producer, DirectoryError>;

    fn is_producer_enabled(&self, id: ProducerId) -> Result<bool, DirectoryError>;

    fn is_producer_down(&self, id: ProducerId) -> Result<bool, DirectoryError>;

    fn set_producer_down(&self, id: ProducerId, flagged_down: bool) -> Result<(), DirectoryError>;

    /// Fails on a zero timestamp.
    fn set_producer_last_message_timestamp(&self, id: ProducerId, timestamp: i64) -> Result<(), DirectoryError>;

    fn set_last_processed_message_gen_timestamp(&self, id: ProducerId, timestamp: i64) -> Result<(), DirectoryError>;

    fn set_last_alive_received_gen_timestamp(&self, id: ProducerId, timestamp: i64) -> Result<(), DirectoryError>;

    fn set_producer_recovery_info(&self, id: ProducerId, info: RecoveryInfo) -> Result<(), DirectoryError>;

    /// Producers the feed reports as active.
    fn active_producers(&self) -> Result<BTreeMap<ProducerId, Producer>, DirectoryError>;
}

/// Mutable state kept for one described producer.
#[derive(Debug, Clone)]
struct ProducerEntry {
    descriptor: ProducerDescriptor,
    enabled: bool,
    flagged_down: bool,
    last_message_timestamp: i64,
    last_processed_message_gen_timestamp: i64,
    last_alive_received_gen_timestamp: i64,
    recovery_from_timestamp: i64,
    last_recovery_info: Option<RecoveryInfo>,
}

impl ProducerEntry {
    fn new(descriptor: ProducerDescriptor) -> Self {
        Self {
            enabled: descriptor.active,
            // Every producer is down until its first recovery completes
            flagged_down: true,
            last_message_timestamp: 0,
            last_processed_message_gen_timestamp: 0,
            last_alive_received_gen_timestamp: 0,
            recovery_from_timestamp: 0,
            last_recovery_info: None,
            descriptor,
        }
    }

    fn to_producer(&self) -> Result<Producer, DirectoryError> {
        let scopes = self
            .descriptor
            .scopes()
            .map_err(|source| DirectoryError::UnknownScope {
                producer_id: self.descriptor.id,
                source,
            })?;

        Ok(Producer {
            id: self.descriptor.id,
            name: self.descriptor.name.clone(),
            description: self.descriptor.description.clone(),
            api_endpoint: self.descriptor.api_endpoint.clone(),
            active: self.descriptor.active,
            enabled: self.enabled,
            flagged_down: self.flagged_down,
            scopes,
            stateful_recovery_window_minutes: self.descriptor.stateful_recovery_window_minutes,
            last_message_timestamp: self.last_message_timestamp,
            last_processed_message_gen_timestamp: self.last_processed_message_gen_timestamp,
            last_alive_received_gen_timestamp: self.last_alive_received_gen_timestamp,
            recovery_from_timestamp: self.recovery_from_timestamp,
            last_recovery_info: self.last_recovery_info.clone(),
        })
    }
}

/// In-process producer directory seeded from the feed's producer list.
pub struct InMemoryProducerDirectory {
    entries: DashMap<ProducerId, ProducerEntry>,
    /// API endpoint reported for producers the feed never described.
    fallback_api_endpoint: String,
}

impl InMemoryProducerDirectory {
    pub fn new(
        descriptors: impl IntoIterator<Item = ProducerDescriptor>,
        fallback_api_endpoint: impl Into<String>,
    ) -> Self {
        let entries = DashMap::new();
        for descriptor in descriptors {
            entries.insert(descriptor.id, ProducerEntry::new(descriptor));
        }

        debug!(producers = entries.len(), "Producer directory initialized");

        Self {
            entries,
            fallback_api_endpoint: fallback_api_endpoint.into(),
        }
    }

    fn with_entry<T>(
        &self,
        id: ProducerId,
        f: impl FnOnce(&ProducerEntry) -> T,
    ) -> Result<T, DirectoryError> {
        self.entries
            .get(&id)
            .map(|entry| f(&entry))
            .ok_or(DirectoryError::UnknownProducer(id))
    }

    fn update_entry(
        &self,
        id: ProducerId,
        f: impl FnOnce(&mut ProducerEntry),
    ) -> Result<(), DirectoryError> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or(DirectoryError::UnknownProducer(id))?;
        f(&mut entry);
        Ok(())
    }

    fn collect_producers(
        &self,
        filter: impl Fn(&ProducerEntry) -> bool,
    ) -> Result<BTreeMap<ProducerId, Producer>, DirectoryError> {
        let mut producers = BTreeMap::new();
        for entry in self.entries.iter() {
            if filter(entry.value()) {
                producers.insert(*entry.key(), entry.value().to_producer()?);
            }
        }
        Ok(producers)
    }

    /// Every producer the feed described, active or not.
    pub fn available_producers(&self) -> Result<BTreeMap<ProducerId, Producer>, DirectoryError> {
        self.collect_producers(|_| true)
    }

    /// Active producers serving the given scope.
    pub fn active_producers_in_scope(
        &self,
        scope: ProducerScope,
    ) -> Result<BTreeMap<ProducerId, Producer>, DirectoryError> {
        let mut producers = self.active_producers()?;
        producers.retain(|_, p| p.serves(scope));
        Ok(producers)
    }

    pub fn set_producer_enabled(&self, id: ProducerId, enabled: bool) -> Result<(), DirectoryError> {
        self.update_entry(id, |entry| entry.enabled = enabled)
    }

    /// Anchor used for recovery until the first alive is seen.
    ///
    /// `0` clears it; anything older than the producer's stateful recovery
    /// window relative to `now` is rejected.
    pub fn set_recovery_from_timestamp(
        &self,
        id: ProducerId,
        timestamp: i64,
        now: i64,
    ) -> Result<(), DirectoryError> {
        let window_minutes = self.with_entry(id, |e| e.descriptor.stateful_recovery_window_minutes)?;
        if timestamp != 0 && now - timestamp > window_minutes as i64 * 60_000 {
            return Err(DirectoryError::OutsideRecoveryWindow {
                producer_id: id,
                timestamp,
                window_minutes,
            });
        }
        self.update_entry(id, |entry| entry.recovery_from_timestamp = timestamp)
    }
}

impl ProducerDirectory for InMemoryProducerDirectory {
    fn get_producer(&self, id: ProducerId) -> Result<Producer, DirectoryError> {
        match self.entries.get(&id) {
            Some(entry) => entry.to_producer(),
            None => Ok(Producer::unknown(id, self.fallback_api_endpoint.clone())),
        }
    }

    fn is_producer_enabled(&self, id: ProducerId) -> Result<bool, DirectoryError> {
        self.with_entry(id, |e| e.enabled)
    }

    fn is_producer_down(&self, id: ProducerId) -> Result<bool, DirectoryError> {
        self.with_entry(id, |e| e.flagged_down)
    }

    fn set_producer_down(&self, id: ProducerId, flagged_down: bool) -> Result<(), DirectoryError> {
        self.update_entry(id, |entry| entry.flagged_down = flagged_down)
    }

    fn set_producer_last_message_timestamp(&self, id: ProducerId, timestamp: i64) -> Result<(), DirectoryError> {
        if timestamp == 0 {
            return Err(DirectoryError::ZeroTimestamp);
        }
        self.update_entry(id, |entry| entry.last_message_timestamp = timestamp)
    }

    fn set_last_processed_message_gen_timestamp(&self, id: ProducerId, timestamp: i64) -> Result<(), DirectoryError> {
        self.update_entry(id, |entry| entry.last_processed_message_gen_timestamp = timestamp)
    }

    fn set_last_alive_received_gen_timestamp(&self, id: ProducerId, timestamp: i64) -> Result<(), DirectoryError> {
        self.update_entry(id, |entry| entry.last_alive_received_gen_timestamp = timestamp)
    }

    fn set_producer_recovery_info(&self, id: ProducerId, info: RecoveryInfo) -> Result<(), DirectoryError> {
        self.update_entry(id, |entry| entry.last_recovery_info = Some(info))
    }

    fn active_producers(&self) -> Result<BTreeMap<ProducerId, Producer>, DirectoryError> {
        self.collect_producers(|e| e.descriptor.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::RequestId;

    fn descriptor(id: u32, scope: &str, active: bool) -> ProducerDescriptor {
        ProducerDescriptor {
            id: ProducerId::new(id),
            name: format!("producer-{}", id),
            description: String::new(),
            api_endpoint: "https://api.example.test/v1".to_string(),
            active,
            scope: scope.to_string(),
            stateful_recovery_window_minutes: 60,
        }
    }

    fn directory() -> InMemoryProducerDirectory {
        InMemoryProducerDirectory::new(
            vec![
                descriptor(1, "live", true),
                descriptor(3, "prematch", true),
                descriptor(5, "live", false),
            ],
            "https://api.example.test/v1",
        )
    }

    #[test]
    fn test_new_producers_start_flagged_down() {
        let dir = directory();
        assert!(dir.is_producer_down(ProducerId::new(1)).unwrap());
        assert!(dir.is_producer_enabled(ProducerId::new(1)).unwrap());
        assert!(!dir.is_producer_enabled(ProducerId::new(5)).unwrap());
    }

    #[test]
    fn test_active_producers_excludes_inactive() {
        let dir = directory();
        let active = dir.active_producers().unwrap();
        assert_eq!(active.len(), 2);
        assert!(!active.contains_key(&ProducerId::new(5)));
        assert_eq!(dir.available_producers().unwrap().len(), 3);
    }

    #[test]
    fn test_active_producers_in_scope() {
        let dir = directory();
        let live = dir.active_producers_in_scope(ProducerScope::Live).unwrap();
        assert_eq!(live.keys().copied().collect::<Vec<_>>(), vec![ProducerId::new(1)]);
    }

    #[test]
    fn test_unknown_producer_fallback() {
        let dir = directory();
        let producer = dir.get_producer(ProducerId::new(42)).unwrap();
        assert_eq!(producer.name, "unknown");
        assert_eq!(producer.scopes.len(), 2);

        // Setters still refuse unknown ids
        assert_eq!(
            dir.set_producer_down(ProducerId::new(42), false).unwrap_err(),
            DirectoryError::UnknownProducer(ProducerId::new(42))
        );
    }

    #[test]
    fn test_zero_last_message_timestamp_rejected() {
        let dir = directory();
        assert_eq!(
            dir.set_producer_last_message_timestamp(ProducerId::new(1), 0)
                .unwrap_err(),
            DirectoryError::ZeroTimestamp
        );
        dir.set_producer_last_message_timestamp(ProducerId::new(1), 1_000)
            .unwrap();
        assert_eq!(
            dir.get_producer(ProducerId::new(1)).unwrap().last_message_timestamp,
            1_000
        );
    }

    #[test]
    fn test_recovery_from_timestamp_window() {
        let dir = directory();
        let now = 10 * 60 * 60_000;

        dir.set_recovery_from_timestamp(ProducerId::new(1), now - 30 * 60_000, now)
            .unwrap();
        assert_eq!(
            dir.get_producer(ProducerId::new(1))
                .unwrap()
                .timestamp_for_recovery(),
            now - 30 * 60_000
        );

        let err = dir
            .set_recovery_from_timestamp(ProducerId::new(1), now - 61 * 60_000, now)
            .unwrap_err();
        assert!(matches!(err, DirectoryError::OutsideRecoveryWindow { .. }));

        dir.set_recovery_from_timestamp(ProducerId::new(1), 0, now).unwrap();
    }

    #[test]
    fn test_unknown_scope_surfaces_on_read() {
        let dir = InMemoryProducerDirectory::new(vec![descriptor(7, "virtual", true)], "");
        let err = dir.get_producer(ProducerId::new(7)).unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownScope { .. }));
        // Flags remain readable
        assert!(dir.is_producer_down(ProducerId::new(7)).unwrap());
    }

    #[test]
    fn test_recovery_info_overwritten() {
        let dir = directory();
        let id = ProducerId::new(1);
        for request in [10, 11] {
            dir.set_producer_recovery_info(
                id,
                RecoveryInfo {
                    after: 0,
                    timestamp: 5,
                    request_id: RequestId::new(request),
                    successful: true,
                    node_id: None,
                },
            )
            .unwrap();
        }
        let info = dir.get_producer(id).unwrap().last_recovery_info.unwrap();
        assert_eq!(info.request_id, RequestId::new(11));
    }
}
