//! In-memory bus for testing and single-process scenarios.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::{MessageBus, PublishError};

/// In-memory bus with an append-only per-subject log.
///
/// Features:
/// - Thread-safe; `Clone` creates another handle to the same log
/// - `set_connected(false)` simulates a bus outage
/// - `fail_next(n)` makes the next `n` publishes time out
///
/// ## Example
///
/// ```
/// use coffee_rota::bus::{InMemoryBus, MessageBus};
///
/// let bus = InMemoryBus::new();
/// bus.publish("next-payment", br#"{"amount":"2.50"}"#).unwrap();
///
/// assert_eq!(bus.published_on("next-payment").len(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryBus {
    log: Arc<RwLock<Vec<(String, Vec<u8>)>>>,
    connected: Arc<AtomicBool>,
    fail_next: Arc<AtomicUsize>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
            fail_next: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Toggle the simulated connection state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next `n` publish calls fail with a timeout.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// All published `(subject, payload)` pairs, in publish order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.log.read().map(|log| log.clone()).unwrap_or_default()
    }

    /// Payloads published on one subject, in publish order.
    pub fn published_on(&self, subject: &str) -> Vec<Vec<u8>> {
        self.log
            .read()
            .map(|log| {
                log.iter()
                    .filter(|(s, _)| s == subject)
                    .map(|(_, payload)| payload.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageBus for InMemoryBus {
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::ConnectionFailed(
                "in-memory bus disconnected".to_string(),
            ));
        }

        let mut remaining = self.fail_next.load(Ordering::SeqCst);
        while remaining > 0 {
            match self.fail_next.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Err(PublishError::Timeout),
                Err(actual) => remaining = actual,
            }
        }

        let mut log = self
            .log
            .write()
            .map_err(|_| PublishError::Rejected("bus log lock poisoned".to_string()))?;
        log.push((subject.to_string(), payload.to_vec()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_appends_to_subject_log() {
        let bus = InMemoryBus::new();
        bus.publish("a", b"1").unwrap();
        bus.publish("b", b"2").unwrap();
        bus.publish("a", b"3").unwrap();

        assert_eq!(bus.len(), 3);
        assert_eq!(bus.published_on("a"), vec![b"1".to_vec(), b"3".to_vec()]);
        assert_eq!(bus.published_on("b").len(), 1);
    }

    #[test]
    fn disconnected_bus_refuses_publish() {
        let bus = InMemoryBus::new();
        bus.set_connected(false);
        assert!(!bus.is_connected());

        let err = bus.publish("a", b"1").unwrap_err();
        assert!(matches!(err, PublishError::ConnectionFailed(_)));
        assert!(bus.is_empty());

        bus.set_connected(true);
        bus.publish("a", b"1").unwrap();
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn fail_next_times_out_then_recovers() {
        let bus = InMemoryBus::new();
        bus.fail_next(2);

        assert!(matches!(
            bus.publish("a", b"1").unwrap_err(),
            PublishError::Timeout
        ));
        assert!(matches!(
            bus.publish("a", b"2").unwrap_err(),
            PublishError::Timeout
        ));
        bus.publish("a", b"3").unwrap();
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn clone_shares_log() {
        let bus = InMemoryBus::new();
        let other = bus.clone();
        other.publish("a", b"1").unwrap();
        assert_eq!(bus.len(), 1);
    }
}
