use serde::{Deserialize, Serialize};

use super::UserId;

/// A registered user, as seen by the rotation core.
///
/// Authentication and profile management live in the auth service; this is
/// the minimal projection the coordinator needs to build event payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
        }
    }
}
