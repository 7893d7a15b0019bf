use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Addressable scope of interest a session subscribes to
///
/// Ordered so a full topic set is always retransmitted in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Topic {
    Class(Uuid),
    Organization(Uuid),
}

impl Topic {
    pub fn class(class_id: Uuid) -> Self {
        Topic::Class(class_id)
    }

    pub fn organization(organization_id: Uuid) -> Self {
        Topic::Organization(organization_id)
    }

    pub fn id(&self) -> Uuid {
        match self {
            Topic::Class(id) | Topic::Organization(id) => *id,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Class(id) => write!(f, "class:{}", id),
            Topic::Organization(id) => write!(f, "organization:{}", id),
        }
    }
}
