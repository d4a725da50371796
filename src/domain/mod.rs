//! Domain records for the rotation core.
//!
//! Entities reference each other by numeric id only; resolution goes
//! through the [`MemoryStore`](crate::MemoryStore). There are no embedded
//! object graphs, so a membership can be updated without touching the user
//! or group it points at.

mod group;
mod membership;
mod payment;
mod user;

pub use group::Group;
pub use membership::{Membership, PaymentStatus};
pub use payment::Payment;
pub use user::User;

pub type UserId = u64;
pub type GroupId = u64;
pub type MembershipId = u64;
pub type PaymentId = u64;

/// Identifier of an outbox row.
pub type EventId = u64;
