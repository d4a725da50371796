use serde::Serialize;

use crate::domain::EventId;
use crate::error::AppendError;
use crate::store::Transaction;

/// Stages events into the outbox inside the caller's transaction.
///
/// No network I/O happens here; the append is a purely local durable
/// insert that commits or rolls back with the enclosing business mutation.
/// If the payload cannot be serialized the append fails, which aborts the
/// transaction: fail fast rather than silently lose the event.
pub struct OutboxWriter;

impl OutboxWriter {
    /// Serialize `event` and stage it for delivery on `subject`.
    pub fn append<T: Serialize>(
        tx: &mut Transaction<'_>,
        subject: &str,
        event_type: &str,
        event: &T,
    ) -> Result<EventId, AppendError> {
        if subject.is_empty() {
            return Err(AppendError::EmptySubject);
        }
        let payload = serde_json::to_string(event)
            .map_err(|err| AppendError::Serialization(err.to_string()))?;
        Ok(tx.append_outbox(subject, event_type, payload))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Serialize;

    use super::*;
    use crate::error::StoreError;
    use crate::MemoryStore;

    #[derive(Serialize)]
    struct Ping {
        n: u32,
    }

    #[test]
    fn append_stages_serialized_payload() {
        let store = MemoryStore::new();
        store
            .transaction(|tx| -> Result<(), StoreError> {
                let id = OutboxWriter::append(tx, "pings", "Ping", &Ping { n: 1 }).unwrap();
                assert_eq!(id, 1);
                Ok(())
            })
            .unwrap();

        let records = store.outbox_snapshot().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject, "pings");
        assert_eq!(records[0].event_type, "Ping");
        assert_eq!(records[0].payload, r#"{"n":1}"#);
        assert!(records[0].is_pending());
    }

    #[test]
    fn empty_subject_is_rejected() {
        let store = MemoryStore::new();
        let result = store.transaction(|tx| -> Result<(), CoordinatorLike> {
            OutboxWriter::append(tx, "", "Ping", &Ping { n: 1 })?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(CoordinatorLike::Append(AppendError::EmptySubject))
        ));
        assert!(store.outbox_snapshot().unwrap().is_empty());
    }

    #[test]
    fn serialization_failure_aborts_the_transaction() {
        let store = MemoryStore::new();

        // serde_json refuses maps with non-string keys.
        let mut bad: HashMap<(u32, u32), u32> = HashMap::new();
        bad.insert((1, 2), 3);

        let result = store.transaction(|tx| -> Result<(), CoordinatorLike> {
            // A successful append first, to prove rollback covers it too.
            OutboxWriter::append(tx, "pings", "Ping", &Ping { n: 1 })?;
            OutboxWriter::append(tx, "pings", "Bad", &bad)?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(CoordinatorLike::Append(AppendError::Serialization(_)))
        ));
        assert!(store.outbox_snapshot().unwrap().is_empty());
    }

    // Minimal error wrapper so `?` works inside the test transactions.
    #[derive(Debug)]
    enum CoordinatorLike {
        Append(AppendError),
        Store(StoreError),
    }

    impl From<AppendError> for CoordinatorLike {
        fn from(err: AppendError) -> Self {
            CoordinatorLike::Append(err)
        }
    }

    impl From<StoreError> for CoordinatorLike {
        fn from(err: StoreError) -> Self {
            CoordinatorLike::Store(err)
        }
    }
}
