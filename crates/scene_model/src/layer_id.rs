//! Layer identity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a layer in the scene arena.
/// Stable for the lifetime of the layer, including while it is detached
/// from the tree and referenced only by the undo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Create a new random LayerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a LayerId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse a LayerId from its string form
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for LayerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<LayerId> for Uuid {
    fn from(id: LayerId) -> Self {
        id.0
    }
}
