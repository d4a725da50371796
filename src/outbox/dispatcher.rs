use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, warn};

use crate::bus::MessageBus;
use crate::config::DispatcherConfig;
use crate::error::StoreError;
use crate::store::MemoryStore;

/// Result of one drain cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    /// The whole cycle was skipped because the bus was down.
    pub skipped: bool,
    pub claimed: usize,
    pub published: usize,
    pub failed: usize,
}

/// Delivers pending outbox records to the message bus.
///
/// Each drain cycle claims a batch, publishes record by record, and writes
/// the outcome back per record; one failure never blocks the batch, and
/// re-running after a clean cycle is a no-op. There is no backoff beyond
/// the polling interval itself; a record out of retry budget is parked,
/// never deleted.
pub struct OutboxDispatcher<B> {
    store: MemoryStore,
    bus: B,
    config: DispatcherConfig,
    worker_id: String,
}

impl<B> OutboxDispatcher<B> {
    pub fn new(store: MemoryStore, bus: B) -> Self {
        Self {
            store,
            bus,
            config: DispatcherConfig::default(),
            worker_id: format!("dispatcher-{}", std::process::id()),
        }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the worker id used for claim leases.
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B: MessageBus> OutboxDispatcher<B> {
    /// Run one drain cycle.
    pub fn drain_batch(&self) -> Result<DrainResult, StoreError> {
        if !self.bus.is_connected() {
            debug!(worker = %self.worker_id, "bus down, skipping drain cycle");
            return Ok(DrainResult {
                skipped: true,
                ..DrainResult::default()
            });
        }

        let claimed = self.store.claim_outbox(
            &self.worker_id,
            self.config.batch_size,
            self.config.claim_lease,
            self.config.max_retries,
        )?;

        let mut result = DrainResult {
            claimed: claimed.len(),
            ..DrainResult::default()
        };

        for record in claimed {
            match self.bus.publish(&record.subject, record.payload.as_bytes()) {
                Ok(()) => {
                    self.store.complete_outbox(record.id)?;
                    result.published += 1;
                }
                Err(err) => {
                    let reason = err.to_string();
                    warn!(
                        event_id = record.id,
                        subject = %record.subject,
                        retry_count = record.retry_count + 1,
                        error = %reason,
                        "outbox publish failed"
                    );
                    self.store.record_outbox_failure(record.id, &reason)?;
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }

    /// Purge processed records older than the configured retention window.
    pub fn cleanup(&self) -> Result<usize, StoreError> {
        let cutoff =
            Utc::now() - ChronoDuration::days(i64::from(self.config.cleanup_retention_days));
        self.cleanup_before(cutoff)
    }

    /// Purge processed records older than an explicit cutoff.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let purged = self.store.purge_processed_before(cutoff)?;
        if purged > 0 {
            debug!(purged, "outbox cleanup removed processed records");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::outbox::OutboxWriter;

    fn store_with_events(n: u32) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .transaction(|tx| -> Result<(), StoreError> {
                for i in 0..n {
                    OutboxWriter::append(tx, "s", "E", &i).unwrap();
                }
                Ok(())
            })
            .unwrap();
        store
    }

    #[test]
    fn drain_publishes_everything_once() {
        let store = store_with_events(3);
        let bus = InMemoryBus::new();
        let dispatcher = OutboxDispatcher::new(store.clone(), bus.clone());

        let result = dispatcher.drain_batch().unwrap();
        assert_eq!(result.claimed, 3);
        assert_eq!(result.published, 3);
        assert_eq!(result.failed, 0);
        assert!(!result.skipped);
        assert_eq!(bus.len(), 3);

        // Second run is a no-op.
        let result = dispatcher.drain_batch().unwrap();
        assert_eq!(result.claimed, 0);
        assert_eq!(bus.len(), 3);
    }

    #[test]
    fn bus_down_skips_the_whole_cycle() {
        let store = store_with_events(2);
        let bus = InMemoryBus::new();
        bus.set_connected(false);
        let dispatcher = OutboxDispatcher::new(store.clone(), bus.clone());

        let result = dispatcher.drain_batch().unwrap();
        assert!(result.skipped);
        assert_eq!(result.claimed, 0);

        // No leases were taken, no retry budget was spent.
        let records = store.outbox_snapshot().unwrap();
        assert!(records.iter().all(|r| r.retry_count == 0));
        assert!(records.iter().all(|r| r.locked_by.is_none()));
    }

    #[test]
    fn batch_size_bounds_a_cycle() {
        let store = store_with_events(5);
        let bus = InMemoryBus::new();
        let dispatcher = OutboxDispatcher::new(store, bus.clone())
            .with_config(DispatcherConfig::default().with_batch_size(2));

        assert_eq!(dispatcher.drain_batch().unwrap().published, 2);
        assert_eq!(dispatcher.drain_batch().unwrap().published, 2);
        assert_eq!(dispatcher.drain_batch().unwrap().published, 1);
        assert_eq!(bus.len(), 5);
    }
}
