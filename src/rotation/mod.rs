//! Pure next-payer selection.
//!
//! The engine performs no I/O: the coordinator hands it the group's
//! memberships, it mutates them in place and returns a [`Decision`]. The
//! tie-break among eligible members is uniformly random (fairness over
//! strict ordering), with the random source behind a trait so tests can
//! script it.

use std::collections::VecDeque;

use rand::Rng;

use crate::domain::{Membership, MembershipId, PaymentStatus, UserId};
use crate::error::RotationError;

/// Source of uniform picks in `0..bound`.
pub trait RandomSource {
    /// Return an index in `0..bound`. `bound` is always >= 1.
    fn pick(&mut self, bound: usize) -> usize;
}

/// Production source: `rand`'s thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&mut self, bound: usize) -> usize {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Scripted source for deterministic tests. Each call pops the next
/// scripted pick (taken modulo the bound); an exhausted script picks 0.
#[derive(Clone, Debug, Default)]
pub struct FixedRandom {
    picks: VecDeque<usize>,
}

impl FixedRandom {
    pub fn new(picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            picks: picks.into_iter().collect(),
        }
    }
}

impl RandomSource for FixedRandom {
    fn pick(&mut self, bound: usize) -> usize {
        self.picks.pop_front().unwrap_or(0) % bound
    }
}

/// Outcome of one rotation decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub membership_id: MembershipId,
    pub user_id: UserId,
    /// Whether this decision started a new round (every status was reset
    /// to `NotPaid` before selecting).
    pub round_reset: bool,
}

/// Decides who pays next.
pub struct RotationEngine<R = ThreadRandom> {
    random: R,
}

impl Default for RotationEngine<ThreadRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationEngine<ThreadRandom> {
    pub fn new() -> Self {
        Self {
            random: ThreadRandom,
        }
    }
}

impl<R: RandomSource> RotationEngine<R> {
    pub fn with_random(random: R) -> Self {
        Self { random }
    }

    /// Consume at most one pending skip before a decision.
    ///
    /// A skip is single-round: the member sits out exactly one decision and
    /// then owes again. `exclude` names the membership skipped by the
    /// operation currently in flight, so a fresh skip is not undone by its
    /// own decision.
    pub fn reset_skipped(
        &self,
        members: &mut [Membership],
        exclude: Option<MembershipId>,
    ) {
        if let Some(member) = members
            .iter_mut()
            .find(|m| m.status == PaymentStatus::Skipped && Some(m.id) != exclude)
        {
            member.status = PaymentStatus::NotPaid;
        }
    }

    /// Pick the next payer and move the turn flag to them.
    ///
    /// Selection is uniform among members still owing this round. When
    /// nobody owes, every status resets to `NotPaid` (a new round) before
    /// selecting. `exclude_user`, normally the member who just paid, is
    /// left out of the candidate set to reduce repeat turns, unless that
    /// would leave no candidates (a single-member group still rotates onto
    /// its only member).
    ///
    /// Postcondition: exactly one membership in `members` has `my_turn`.
    pub fn next_payer(
        &mut self,
        members: &mut [Membership],
        exclude_user: Option<UserId>,
    ) -> Result<Decision, RotationError> {
        if members.is_empty() {
            return Err(RotationError::NoActiveMembers);
        }

        let mut round_reset = false;
        let mut eligible = owing_indices(members, exclude_user);
        if eligible.is_empty() && exclude_user.is_some() {
            // Only the excluded member owes; better a repeat turn than none.
            eligible = owing_indices(members, None);
        }

        if eligible.is_empty() {
            // Everyone has paid or skipped: start a new round.
            for member in members.iter_mut() {
                member.status = PaymentStatus::NotPaid;
            }
            round_reset = true;
            eligible = owing_indices(members, exclude_user);
            if eligible.is_empty() {
                eligible = owing_indices(members, None);
            }
        }

        let chosen = eligible[self.random.pick(eligible.len())];
        for member in members.iter_mut() {
            member.my_turn = false;
        }
        members[chosen].my_turn = true;

        Ok(Decision {
            membership_id: members[chosen].id,
            user_id: members[chosen].user_id,
            round_reset,
        })
    }
}

fn owing_indices(members: &[Membership], exclude_user: Option<UserId>) -> Vec<usize> {
    members
        .iter()
        .enumerate()
        .filter(|(_, m)| m.owes_this_round() && Some(m.user_id) != exclude_user)
        .map(|(idx, _)| idx)
        .collect()
}
