use std::fmt;

use crate::domain::UserId;

/// Errors from the in-memory store itself.
///
/// These indicate infrastructure problems (a poisoned lock), not business
/// failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    LockPoisoned(&'static str),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::LockPoisoned(operation) => {
                write!(f, "store lock poisoned during {}", operation)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from the rotation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    /// The group has no memberships at all. A decision requires at least
    /// one active member; an empty roster is a data-integrity problem
    /// upstream and must be surfaced, never defaulted.
    NoActiveMembers,
}

impl fmt::Display for RotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationError::NoActiveMembers => {
                write!(f, "rotation requires at least one active group member")
            }
        }
    }
}

impl std::error::Error for RotationError {}

/// Errors raised when staging an event into the outbox.
///
/// Both variants abort the enclosing transaction: the business mutation and
/// the event are atomic, so a payload that cannot be staged must fail the
/// whole operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendError {
    EmptySubject,
    Serialization(String),
}

impl fmt::Display for AppendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppendError::EmptySubject => write!(f, "outbox subject must be non-empty"),
            AppendError::Serialization(message) => {
                write!(f, "event payload serialization failed: {}", message)
            }
        }
    }
}

impl std::error::Error for AppendError {}

/// Business-operation failures surfaced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    UserNotFound(UserId),
    GroupNotFound(String),
    MembershipNotFound { user_id: UserId, group: String },
    /// `pay_for_member` found no membership with the turn flag set.
    NoDesignatedPayer(String),
    Rotation(RotationError),
    Append(AppendError),
    Store(StoreError),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorError::UserNotFound(id) => write!(f, "user {} not found", id),
            CoordinatorError::GroupNotFound(name) => write!(f, "group '{}' not found", name),
            CoordinatorError::MembershipNotFound { user_id, group } => {
                write!(f, "user {} has no membership in group '{}'", user_id, group)
            }
            CoordinatorError::NoDesignatedPayer(group) => {
                write!(f, "no member of group '{}' currently holds the turn", group)
            }
            CoordinatorError::Rotation(err) => write!(f, "rotation failed: {}", err),
            CoordinatorError::Append(err) => write!(f, "outbox append failed: {}", err),
            CoordinatorError::Store(err) => write!(f, "store failure: {}", err),
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordinatorError::Rotation(err) => Some(err),
            CoordinatorError::Append(err) => Some(err),
            CoordinatorError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RotationError> for CoordinatorError {
    fn from(err: RotationError) -> Self {
        CoordinatorError::Rotation(err)
    }
}

impl From<AppendError> for CoordinatorError {
    fn from(err: AppendError) -> Self {
        CoordinatorError::Append(err)
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        CoordinatorError::Store(err)
    }
}
