//! In-memory store: the single source of truth for users, groups,
//! memberships, payments and the outbox table.
//!
//! Keeping the outbox in the same store is the point of the outbox
//! pattern: a business mutation and the event that documents it commit or
//! roll back together. [`MemoryStore::transaction`] runs the caller's
//! closure against a staged copy of the state under the write lock and
//! installs the copy only on `Ok`, so partial effects are impossible and
//! concurrent rotation operations are serialized by the lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    EventId, Group, GroupId, Membership, MembershipId, Payment, PaymentId, User, UserId,
};
use crate::error::StoreError;
use crate::outbox::{truncate_error, OutboxRecord};

#[derive(Clone, Default)]
struct StoreInner {
    users: HashMap<UserId, User>,
    groups: HashMap<GroupId, Group>,
    memberships: HashMap<MembershipId, Membership>,
    payments: HashMap<PaymentId, Payment>,
    /// Append-only except for retention cleanup; insertion order is
    /// creation order, which gives the dispatcher its oldest-first scan.
    outbox: Vec<OutboxRecord>,
    next_user_id: UserId,
    next_group_id: GroupId,
    next_membership_id: MembershipId,
    next_payment_id: PaymentId,
    next_event_id: EventId,
}

/// Cloneable handle to shared storage. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` as one transaction.
    ///
    /// The closure sees a staged copy of the store; its effects become
    /// visible (and durable, for a persistent backend) if and only if it
    /// returns `Ok`. The write lock is held for the whole closure, which
    /// serializes concurrent transactions: two racing rotation decisions
    /// cannot both read a stale membership set.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| E::from(StoreError::LockPoisoned("transaction")))?;
        let mut staged = guard.clone();
        let value = f(&mut Transaction { inner: &mut staged })?;
        *guard = staged;
        Ok(value)
    }

    // -- Seeding (used by the surrounding CRUD services and by tests) --

    pub fn add_user(
        &self,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<UserId, StoreError> {
        let mut inner = self.write("add_user")?;
        inner.next_user_id += 1;
        let id = inner.next_user_id;
        inner.users.insert(id, User::new(id, username, email));
        Ok(id)
    }

    pub fn add_group(&self, name: impl Into<String>) -> Result<GroupId, StoreError> {
        let mut inner = self.write("add_group")?;
        inner.next_group_id += 1;
        let id = inner.next_group_id;
        inner.groups.insert(id, Group::new(id, name));
        Ok(id)
    }

    pub fn add_membership(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<MembershipId, StoreError> {
        let mut inner = self.write("add_membership")?;
        inner.next_membership_id += 1;
        let id = inner.next_membership_id;
        inner
            .memberships
            .insert(id, Membership::new(id, group_id, user_id));
        Ok(id)
    }

    // -- Reads --

    pub fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read("user")?.users.get(&id).cloned())
    }

    pub fn group_by_name(&self, name: &str) -> Result<Option<Group>, StoreError> {
        Ok(self
            .read("group_by_name")?
            .groups
            .values()
            .find(|group| group.name == name)
            .cloned())
    }

    pub fn membership(&self, id: MembershipId) -> Result<Option<Membership>, StoreError> {
        Ok(self.read("membership")?.memberships.get(&id).copied())
    }

    /// All memberships of a group, ordered by membership id.
    pub fn group_memberships(&self, group_id: GroupId) -> Result<Vec<Membership>, StoreError> {
        let inner = self.read("group_memberships")?;
        let mut members: Vec<Membership> = inner
            .memberships
            .values()
            .filter(|m| m.group_id == group_id)
            .copied()
            .collect();
        members.sort_by_key(|m| m.id);
        Ok(members)
    }

    pub fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self.read("payment")?.payments.get(&id).cloned())
    }

    /// Full copy of the outbox table, for tests and operator inspection.
    pub fn outbox_snapshot(&self) -> Result<Vec<OutboxRecord>, StoreError> {
        Ok(self.read("outbox_snapshot")?.outbox.clone())
    }

    // -- Dispatcher-facing outbox operations --
    //
    // Each is its own short critical section: the dispatcher never holds
    // the lock across a network publish.

    /// Claim up to `max` deliverable records, oldest first.
    ///
    /// Deliverable: not processed, retry budget left, and not under a live
    /// lease from another dispatcher instance. Claiming takes the lease but
    /// does not touch `retry_count`; only a failed publish does.
    pub fn claim_outbox(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
        max_retries: u32,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let mut inner = self.write("claim_outbox")?;
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX);
        let until = now.checked_add_signed(lease).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut claimed = Vec::new();
        for record in inner.outbox.iter_mut() {
            if claimed.len() >= max {
                break;
            }
            if record.is_processed()
                || record.retry_count >= max_retries
                || record.is_locked_at(now)
            {
                continue;
            }
            record.locked_by = Some(worker_id.to_string());
            record.locked_until = Some(until);
            claimed.push(record.clone());
        }
        Ok(claimed)
    }

    /// Record first successful delivery: sets `processed_at` once, clears
    /// any error and lease. A second call for the same id is a no-op.
    pub fn complete_outbox(&self, id: EventId) -> Result<(), StoreError> {
        let mut inner = self.write("complete_outbox")?;
        let now = Utc::now();
        if let Some(record) = inner.outbox.iter_mut().find(|r| r.id == id) {
            if record.processed_at.is_none() {
                record.processed_at = Some(now);
            }
            record.last_error = None;
            record.locked_by = None;
            record.locked_until = None;
        }
        Ok(())
    }

    /// Record a failed delivery attempt: bumps `retry_count`, stores a
    /// bounded error description, releases the lease so the next cycle
    /// (or another instance) may retry.
    pub fn record_outbox_failure(&self, id: EventId, error: &str) -> Result<(), StoreError> {
        let mut inner = self.write("record_outbox_failure")?;
        if let Some(record) = inner.outbox.iter_mut().find(|r| r.id == id) {
            if record.processed_at.is_some() {
                return Ok(());
            }
            record.retry_count = record.retry_count.saturating_add(1);
            record.last_error = Some(truncate_error(error));
            record.locked_by = None;
            record.locked_until = None;
        }
        Ok(())
    }

    /// Delete processed records older than `cutoff`. Pending and poisoned
    /// records are never touched. Returns the number purged.
    pub fn purge_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.write("purge_processed_before")?;
        let before = inner.outbox.len();
        inner
            .outbox
            .retain(|record| match record.processed_at {
                Some(processed_at) => processed_at >= cutoff,
                None => true,
            });
        Ok(before - inner.outbox.len())
    }

    fn read(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::RwLockReadGuard<'_, StoreInner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::LockPoisoned(operation))
    }

    fn write(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::RwLockWriteGuard<'_, StoreInner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::LockPoisoned(operation))
    }
}

/// A staged view of the store, handed to [`MemoryStore::transaction`]
/// closures. Mutations land in the staged copy and become visible only
/// when the closure returns `Ok`.
pub struct Transaction<'a> {
    inner: &'a mut StoreInner,
}

impl Transaction<'_> {
    pub fn user(&self, id: UserId) -> Option<User> {
        self.inner.users.get(&id).cloned()
    }

    pub fn group_by_name(&self, name: &str) -> Option<Group> {
        self.inner
            .groups
            .values()
            .find(|group| group.name == name)
            .cloned()
    }

    /// All memberships of a group, ordered by membership id.
    pub fn group_memberships(&self, group_id: GroupId) -> Vec<Membership> {
        let mut members: Vec<Membership> = self
            .inner
            .memberships
            .values()
            .filter(|m| m.group_id == group_id)
            .copied()
            .collect();
        members.sort_by_key(|m| m.id);
        members
    }

    /// Write back a set of memberships mutated by the rotation engine.
    pub fn put_memberships(&mut self, members: &[Membership]) {
        for member in members {
            self.inner.memberships.insert(member.id, *member);
        }
    }

    pub fn insert_payment(
        &mut self,
        group_id: GroupId,
        payer_id: UserId,
        amount: Decimal,
        description: impl Into<String>,
        paid_at: DateTime<Utc>,
    ) -> PaymentId {
        self.inner.next_payment_id += 1;
        let id = self.inner.next_payment_id;
        self.inner.payments.insert(
            id,
            Payment {
                id,
                group_id,
                payer_id,
                amount,
                description: description.into(),
                paid_at,
            },
        );
        id
    }

    /// Stage a raw outbox row. Producers go through
    /// [`OutboxWriter`](crate::OutboxWriter), which serializes the payload
    /// and validates the subject first.
    pub(crate) fn append_outbox(
        &mut self,
        subject: &str,
        event_type: &str,
        payload: String,
    ) -> EventId {
        self.inner.next_event_id += 1;
        let id = self.inner.next_event_id;
        self.inner
            .outbox
            .push(OutboxRecord::new(id, subject, event_type, payload, Utc::now()));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentStatus;

    #[test]
    fn transaction_commits_on_ok() {
        let store = MemoryStore::new();
        let group_id = store.add_group("office").unwrap();
        let user_id = store.add_user("alice", "alice@example.com").unwrap();
        store.add_membership(group_id, user_id).unwrap();

        store
            .transaction(|tx| -> Result<(), StoreError> {
                let mut members = tx.group_memberships(group_id);
                members[0].status = PaymentStatus::Paid;
                tx.put_memberships(&members);
                tx.append_outbox("next-payment", "NextPaymentEvent", "{}".to_string());
                Ok(())
            })
            .unwrap();

        let members = store.group_memberships(group_id).unwrap();
        assert_eq!(members[0].status, PaymentStatus::Paid);
        assert_eq!(store.outbox_snapshot().unwrap().len(), 1);
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let store = MemoryStore::new();
        let group_id = store.add_group("office").unwrap();
        let user_id = store.add_user("alice", "alice@example.com").unwrap();
        store.add_membership(group_id, user_id).unwrap();

        let result = store.transaction(|tx| -> Result<(), StoreError> {
            let mut members = tx.group_memberships(group_id);
            members[0].status = PaymentStatus::Paid;
            tx.put_memberships(&members);
            tx.append_outbox("next-payment", "NextPaymentEvent", "{}".to_string());
            Err(StoreError::LockPoisoned("simulated"))
        });
        assert!(result.is_err());

        // Neither the membership change nor the outbox row survived.
        let members = store.group_memberships(group_id).unwrap();
        assert_eq!(members[0].status, PaymentStatus::NotPaid);
        assert!(store.outbox_snapshot().unwrap().is_empty());
    }

    #[test]
    fn claim_respects_order_budget_and_lease() {
        let store = MemoryStore::new();
        store
            .transaction(|tx| -> Result<(), StoreError> {
                tx.append_outbox("s", "E", "1".to_string());
                tx.append_outbox("s", "E", "2".to_string());
                tx.append_outbox("s", "E", "3".to_string());
                Ok(())
            })
            .unwrap();

        // Oldest first, bounded by max.
        let claimed = store
            .claim_outbox("w1", 2, Duration::from_secs(60), 5)
            .unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0].payload, "1");
        assert_eq!(claimed[1].payload, "2");

        // A second instance cannot claim leased records.
        let claimed = store
            .claim_outbox("w2", 10, Duration::from_secs(60), 5)
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].payload, "3");
    }

    #[test]
    fn claim_skips_processed_and_poisoned() {
        let store = MemoryStore::new();
        store
            .transaction(|tx| -> Result<(), StoreError> {
                tx.append_outbox("s", "E", "done".to_string());
                tx.append_outbox("s", "E", "poison".to_string());
                tx.append_outbox("s", "E", "fresh".to_string());
                Ok(())
            })
            .unwrap();

        store.complete_outbox(1).unwrap();
        store.record_outbox_failure(2, "boom").unwrap();

        let claimed = store
            .claim_outbox("w", 10, Duration::from_secs(60), 1)
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].payload, "fresh");
    }

    #[test]
    fn complete_clears_error_and_is_set_once() {
        let store = MemoryStore::new();
        store
            .transaction(|tx| -> Result<(), StoreError> {
                tx.append_outbox("s", "E", "{}".to_string());
                Ok(())
            })
            .unwrap();

        store.record_outbox_failure(1, "timeout").unwrap();
        let record = &store.outbox_snapshot().unwrap()[0];
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.last_error.as_deref(), Some("timeout"));

        store.complete_outbox(1).unwrap();
        let record = store.outbox_snapshot().unwrap()[0].clone();
        assert!(record.is_processed());
        assert!(record.last_error.is_none());

        // Late duplicate completion must not move the timestamp.
        store.complete_outbox(1).unwrap();
        assert_eq!(
            store.outbox_snapshot().unwrap()[0].processed_at,
            record.processed_at
        );

        // A stale failure report after delivery is ignored.
        store.record_outbox_failure(1, "late timeout").unwrap();
        let record = &store.outbox_snapshot().unwrap()[0];
        assert!(record.last_error.is_none());
        assert_eq!(record.retry_count, 1);
    }

    #[test]
    fn purge_removes_only_old_processed_rows() {
        let store = MemoryStore::new();
        store
            .transaction(|tx| -> Result<(), StoreError> {
                tx.append_outbox("s", "E", "processed".to_string());
                tx.append_outbox("s", "E", "pending".to_string());
                tx.append_outbox("s", "E", "poison".to_string());
                Ok(())
            })
            .unwrap();
        store.complete_outbox(1).unwrap();
        store.record_outbox_failure(3, "boom").unwrap();

        // Cutoff in the future: every processed row is "old".
        let cutoff = Utc::now() + chrono::Duration::seconds(5);
        let purged = store.purge_processed_before(cutoff).unwrap();
        assert_eq!(purged, 1);

        let remaining = store.outbox_snapshot().unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|r| r.is_pending()));
    }
}
