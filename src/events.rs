//! Wire contract for outbound events.
//!
//! Consumers (mail dispatch, notification services) deserialize these from
//! the raw payload bytes published on the bus. Field names are camelCase
//! JSON and dates are RFC 3339; this shape is a published contract, so
//! changes here are breaking changes for downstream services.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{PaymentId, UserId};

/// Subject a payment decision is published on.
pub const NEXT_PAYMENT_SUBJECT: &str = "next-payment";

/// Subject a skip decision is published on.
pub const SKIP_PAYMENT_SUBJECT: &str = "skip-payment";

/// Emitted once per completed payment: who just paid, and who pays next.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPaymentEvent {
    pub last_payment_id: PaymentId,
    pub last_payer_username: String,
    pub last_payer_email: String,
    pub next_user_id: UserId,
    pub next_username: String,
    pub next_email: String,
    pub last_payment_date: DateTime<Utc>,
    pub amount: Decimal,
    pub group_name: String,
}

impl NextPaymentEvent {
    pub const EVENT_TYPE: &'static str = "NextPaymentEvent";
}

/// Emitted once per skip: only the next payer is relevant to consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipPaymentEvent {
    pub next_user_id: UserId,
    pub next_username: String,
    pub next_email: String,
}

impl SkipPaymentEvent {
    pub const EVENT_TYPE: &'static str = "SkipPaymentEvent";
}
