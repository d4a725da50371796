//! Orchestrates one user-facing operation as a single transaction.
//!
//! Each operation resolves its actors, mutates membership/payment state,
//! asks the rotation engine for the next payer and stages exactly one
//! outbox event, all inside one [`MemoryStore::transaction`]. Delivery
//! happens later, via the dispatcher; the caller never waits on the bus.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{PaymentId, PaymentStatus, UserId};
use crate::error::CoordinatorError;
use crate::events::{
    NextPaymentEvent, SkipPaymentEvent, NEXT_PAYMENT_SUBJECT, SKIP_PAYMENT_SUBJECT,
};
use crate::outbox::OutboxWriter;
use crate::rotation::{RandomSource, RotationEngine, ThreadRandom};
use crate::store::MemoryStore;

/// What the caller gets back from a payment operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentSummary {
    pub payment_id: PaymentId,
    pub payer_user_id: UserId,
    pub next_user_id: UserId,
    pub next_username: String,
    pub round_reset: bool,
}

/// What the caller gets back from a skip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkipSummary {
    pub next_user_id: UserId,
    pub next_username: String,
    pub round_reset: bool,
}

/// Coordinates payment and skip operations for rotation groups.
pub struct PaymentRotationCoordinator<R = ThreadRandom> {
    store: MemoryStore,
    engine: RotationEngine<R>,
}

impl PaymentRotationCoordinator<ThreadRandom> {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            engine: RotationEngine::new(),
        }
    }
}

impl<R: RandomSource> PaymentRotationCoordinator<R> {
    /// Build a coordinator with an injected rotation engine (tests use a
    /// scripted random source).
    pub fn with_engine(store: MemoryStore, engine: RotationEngine<R>) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// The acting user settles their own turn.
    pub fn register_payment(
        &mut self,
        acting_user_id: UserId,
        group_name: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<PaymentSummary, CoordinatorError> {
        let store = self.store.clone();
        let engine = &mut self.engine;

        store.transaction(|tx| {
            let user = tx
                .user(acting_user_id)
                .ok_or(CoordinatorError::UserNotFound(acting_user_id))?;
            let group = tx
                .group_by_name(group_name)
                .ok_or_else(|| CoordinatorError::GroupNotFound(group_name.to_string()))?;

            let mut members = tx.group_memberships(group.id);
            let own = members
                .iter()
                .position(|m| m.user_id == user.id)
                .ok_or_else(|| CoordinatorError::MembershipNotFound {
                    user_id: user.id,
                    group: group.name.clone(),
                })?;

            members[own].status = PaymentStatus::Paid;
            members[own].my_turn = false;
            let own_membership_id = members[own].id;

            let paid_at = Utc::now();
            let payment_id = tx.insert_payment(group.id, user.id, amount, description, paid_at);

            engine.reset_skipped(&mut members, Some(own_membership_id));
            let decision = engine.next_payer(&mut members, Some(user.id))?;

            let next = tx
                .user(decision.user_id)
                .ok_or(CoordinatorError::UserNotFound(decision.user_id))?;

            let event = NextPaymentEvent {
                last_payment_id: payment_id,
                last_payer_username: user.username.clone(),
                last_payer_email: user.email.clone(),
                next_user_id: next.id,
                next_username: next.username.clone(),
                next_email: next.email.clone(),
                last_payment_date: paid_at,
                amount,
                group_name: group.name.clone(),
            };
            OutboxWriter::append(
                tx,
                NEXT_PAYMENT_SUBJECT,
                NextPaymentEvent::EVENT_TYPE,
                &event,
            )?;

            tx.put_memberships(&members);

            debug!(
                payer = %user.username,
                next = %next.username,
                group = %group.name,
                round_reset = decision.round_reset,
                "payment registered"
            );

            Ok(PaymentSummary {
                payment_id,
                payer_user_id: user.id,
                next_user_id: next.id,
                next_username: next.username,
                round_reset: decision.round_reset,
            })
        })
    }

    /// The acting user pays on behalf of whoever currently holds the turn.
    ///
    /// The turn holder's membership is marked `Paid`; the acting user's own
    /// membership is untouched except for being excluded from immediate
    /// re-selection. One event is emitted, describing the acting payer;
    /// the beneficiary's settled status is visible through the membership
    /// table, not the event.
    pub fn pay_for_member(
        &mut self,
        acting_user_id: UserId,
        group_name: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<PaymentSummary, CoordinatorError> {
        let store = self.store.clone();
        let engine = &mut self.engine;

        store.transaction(|tx| {
            let user = tx
                .user(acting_user_id)
                .ok_or(CoordinatorError::UserNotFound(acting_user_id))?;
            let group = tx
                .group_by_name(group_name)
                .ok_or_else(|| CoordinatorError::GroupNotFound(group_name.to_string()))?;

            let mut members = tx.group_memberships(group.id);
            members
                .iter()
                .position(|m| m.user_id == user.id)
                .ok_or_else(|| CoordinatorError::MembershipNotFound {
                    user_id: user.id,
                    group: group.name.clone(),
                })?;

            let turn = members
                .iter()
                .position(|m| m.my_turn)
                .ok_or_else(|| CoordinatorError::NoDesignatedPayer(group.name.clone()))?;

            members[turn].status = PaymentStatus::Paid;
            members[turn].my_turn = false;

            let paid_at = Utc::now();
            let payment_id = tx.insert_payment(group.id, user.id, amount, description, paid_at);

            engine.reset_skipped(&mut members, None);
            let decision = engine.next_payer(&mut members, Some(user.id))?;

            let next = tx
                .user(decision.user_id)
                .ok_or(CoordinatorError::UserNotFound(decision.user_id))?;

            let event = NextPaymentEvent {
                last_payment_id: payment_id,
                last_payer_username: user.username.clone(),
                last_payer_email: user.email.clone(),
                next_user_id: next.id,
                next_username: next.username.clone(),
                next_email: next.email.clone(),
                last_payment_date: paid_at,
                amount,
                group_name: group.name.clone(),
            };
            OutboxWriter::append(
                tx,
                NEXT_PAYMENT_SUBJECT,
                NextPaymentEvent::EVENT_TYPE,
                &event,
            )?;

            tx.put_memberships(&members);

            debug!(
                payer = %user.username,
                next = %next.username,
                group = %group.name,
                "payment registered on behalf of the turn holder"
            );

            Ok(PaymentSummary {
                payment_id,
                payer_user_id: user.id,
                next_user_id: next.id,
                next_username: next.username,
                round_reset: decision.round_reset,
            })
        })
    }

    /// The acting user sits this round out.
    pub fn skip_payment(
        &mut self,
        acting_user_id: UserId,
        group_name: &str,
    ) -> Result<SkipSummary, CoordinatorError> {
        let store = self.store.clone();
        let engine = &mut self.engine;

        store.transaction(|tx| {
            let user = tx
                .user(acting_user_id)
                .ok_or(CoordinatorError::UserNotFound(acting_user_id))?;
            let group = tx
                .group_by_name(group_name)
                .ok_or_else(|| CoordinatorError::GroupNotFound(group_name.to_string()))?;

            let mut members = tx.group_memberships(group.id);
            let own = members
                .iter()
                .position(|m| m.user_id == user.id)
                .ok_or_else(|| CoordinatorError::MembershipNotFound {
                    user_id: user.id,
                    group: group.name.clone(),
                })?;

            // Consume any skip left over from a previous operation first,
            // so skips never accumulate, then register this one.
            let own_membership_id = members[own].id;
            engine.reset_skipped(&mut members, Some(own_membership_id));
            members[own].status = PaymentStatus::Skipped;
            members[own].my_turn = false;

            let decision = engine.next_payer(&mut members, None)?;
            let next = tx
                .user(decision.user_id)
                .ok_or(CoordinatorError::UserNotFound(decision.user_id))?;

            let event = SkipPaymentEvent {
                next_user_id: next.id,
                next_username: next.username.clone(),
                next_email: next.email.clone(),
            };
            OutboxWriter::append(
                tx,
                SKIP_PAYMENT_SUBJECT,
                SkipPaymentEvent::EVENT_TYPE,
                &event,
            )?;

            tx.put_memberships(&members);

            debug!(
                skipped = %user.username,
                next = %next.username,
                group = %group.name,
                round_reset = decision.round_reset,
                "skip registered"
            );

            Ok(SkipSummary {
                next_user_id: next.id,
                next_username: next.username,
                round_reset: decision.round_reset,
            })
        })
    }
}
