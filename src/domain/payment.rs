use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{GroupId, PaymentId, UserId};

/// A recorded payment. `payer_id` is the user whose money moved, which in
/// the pay-for-another flow is not the member whose turn was settled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub group_id: GroupId,
    pub payer_id: UserId,
    pub amount: Decimal,
    pub description: String,
    pub paid_at: DateTime<Utc>,
}
