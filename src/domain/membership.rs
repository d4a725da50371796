use serde::{Deserialize, Serialize};

use super::{GroupId, MembershipId, UserId};

/// Per-round payment state of one member.
///
/// Transitions, per round: `NotPaid -> Paid` on payment, `NotPaid ->
/// Skipped` on skip, `Skipped -> NotPaid` when the skip is consumed before
/// the next decision, and everything back to `NotPaid` at round rollover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    NotPaid,
    Paid,
    Skipped,
}

/// One user's participation in one group.
///
/// `my_turn` is a single-owner flag: after any rotation decision completes,
/// at most one membership per group carries it. The rotation engine clears
/// the previous holder and sets the new one in the same decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub status: PaymentStatus,
    pub my_turn: bool,
}

impl Membership {
    /// A fresh membership: owes this round, does not hold the turn.
    pub fn new(id: MembershipId, group_id: GroupId, user_id: UserId) -> Self {
        Self {
            id,
            group_id,
            user_id,
            status: PaymentStatus::NotPaid,
            my_turn: false,
        }
    }

    pub fn owes_this_round(&self) -> bool {
        self.status == PaymentStatus::NotPaid
    }
}
