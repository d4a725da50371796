//! Transactional outbox: durable event staging and asynchronous delivery.
//!
//! Producers stage events inside their own store transaction via
//! [`OutboxWriter`]; the [`OutboxDispatcher`] later drains pending records
//! to the message bus with bounded retries. A record that exhausts its
//! retry budget is parked, never silently dropped.

mod dispatcher;
mod record;
mod thread;
mod writer;

pub use dispatcher::{DrainResult, OutboxDispatcher};
pub use record::{truncate_error, OutboxRecord, MAX_LAST_ERROR_LEN};
pub use thread::{DispatcherStats, DispatcherThread};
pub use writer::OutboxWriter;
