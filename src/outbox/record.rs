use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EventId;

/// Upper bound for stored failure descriptions.
pub const MAX_LAST_ERROR_LEN: usize = 500;

/// Durable outbox row.
///
/// Created by [`OutboxWriter`](super::OutboxWriter) inside the producer's
/// transaction; mutated only by the dispatcher; deleted only by the
/// retention cleanup, and only once processed.
///
/// `processed_at` is the delivery state: `None` means pending, `Some` means
/// delivered (set exactly once). Whether a pending record is poison is
/// derived from `retry_count`, a persisted field, so the retry budget
/// survives process restarts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: EventId,
    /// Destination topic/channel. Non-empty.
    pub subject: String,
    /// Logical event name, a deserialization hint for consumers; not
    /// enforced by the store.
    pub event_type: String,
    /// Fully serialized event body, opaque to the store.
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Claim lease, so concurrent dispatcher instances never double-publish.
    pub locked_by: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    pub(crate) fn new(
        id: EventId,
        subject: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject: subject.into(),
            event_type: event_type.into(),
            payload: payload.into(),
            created_at,
            processed_at: None,
            retry_count: 0,
            last_error: None,
            locked_by: None,
            locked_until: None,
        }
    }

    /// Awaiting delivery (regardless of retry budget).
    pub fn is_pending(&self) -> bool {
        self.processed_at.is_none()
    }

    /// Successfully delivered.
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Pending but out of retry budget: parked for operator inspection.
    pub fn is_poisoned(&self, max_retries: u32) -> bool {
        self.is_pending() && self.retry_count >= max_retries
    }

    /// Whether a lease currently excludes other dispatcher instances.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        match self.locked_until {
            Some(until) => until > now,
            None => false,
        }
    }
}

/// Bound a failure description to [`MAX_LAST_ERROR_LEN`] bytes, respecting
/// char boundaries.
pub fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_LAST_ERROR_LEN {
        return error.to_string();
    }
    let mut end = MAX_LAST_ERROR_LEN;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    error[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> OutboxRecord {
        OutboxRecord::new(1, "next-payment", "NextPaymentEvent", "{}", Utc::now())
    }

    #[test]
    fn fresh_record_is_pending() {
        let record = record();
        assert!(record.is_pending());
        assert!(!record.is_processed());
        assert!(!record.is_poisoned(5));
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn poison_is_derived_from_retry_count() {
        let mut record = record();
        record.retry_count = 5;
        assert!(record.is_poisoned(5));
        assert!(!record.is_poisoned(6));

        // A processed record is never poison, whatever its count.
        record.processed_at = Some(Utc::now());
        assert!(!record.is_poisoned(5));
    }

    #[test]
    fn lease_expiry() {
        let mut record = record();
        let now = Utc::now();
        assert!(!record.is_locked_at(now));

        record.locked_until = Some(now + chrono::Duration::seconds(30));
        assert!(record.is_locked_at(now));
        assert!(!record.is_locked_at(now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn truncate_respects_limit_and_boundaries() {
        let short = "timeout";
        assert_eq!(truncate_error(short), "timeout");

        let long = "x".repeat(700);
        assert_eq!(truncate_error(&long).len(), MAX_LAST_ERROR_LEN);

        // Multi-byte char straddling the limit must not split.
        let tricky = format!("{}é", "x".repeat(MAX_LAST_ERROR_LEN - 1));
        let truncated = truncate_error(&tricky);
        assert!(truncated.len() <= MAX_LAST_ERROR_LEN);
        assert!(truncated.is_char_boundary(truncated.len()));
    }
}
