use serde::{Deserialize, Serialize};

use super::GroupId;

/// A coffee group. Membership is modeled separately; the group itself is
/// just a named scope for rotation decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
