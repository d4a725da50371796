//! Payment-rotation core with a transactional outbox.
//!
//! Two coupled guarantees:
//! - every rotation decision (who pays next after a payment or skip)
//!   commits atomically with exactly one durable outbound event, and
//! - that event reaches the message bus at least once, surviving transient
//!   bus outages, with bounded retries and no silent drops.
//!
//! Producers run through [`PaymentRotationCoordinator`]; the
//! [`OutboxDispatcher`] (usually on a [`DispatcherThread`]) relays staged
//! events to a [`bus::MessageBus`] implementation.

pub mod bus;
mod config;
mod coordinator;
pub mod domain;
mod error;
mod events;
mod outbox;
mod rotation;
mod store;

pub use config::DispatcherConfig;
pub use coordinator::{PaymentRotationCoordinator, PaymentSummary, SkipSummary};
pub use error::{AppendError, CoordinatorError, RotationError, StoreError};
pub use events::{
    NextPaymentEvent, SkipPaymentEvent, NEXT_PAYMENT_SUBJECT, SKIP_PAYMENT_SUBJECT,
};
pub use outbox::{
    DispatcherStats, DispatcherThread, DrainResult, OutboxDispatcher, OutboxRecord, OutboxWriter,
    MAX_LAST_ERROR_LEN,
};
pub use rotation::{Decision, FixedRandom, RandomSource, RotationEngine, ThreadRandom};
pub use store::{MemoryStore, Transaction};

// Re-export the bus error alongside the trait for implementors.
pub use bus::PublishError;
