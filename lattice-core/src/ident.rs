//! Identifiers for schema entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a schema entity across schema versions
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EntityId(u64);

impl EntityId {
    /// Create an identifier from its raw value
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Key identifying the defining owner of an inherited member.
///
/// Two bases may expose the same member through a shared ancestor; collapsing
/// inherited candidates by this key counts such a definition exactly once, so
/// only genuinely divergent definitions are treated as a diamond conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginKey(EntityId);

impl OriginKey {
    /// Build the key for a member given its owner backreference, falling
    /// back to the member's own identity for unowned members.
    #[must_use]
    pub fn for_member(member: EntityId, owner: Option<EntityId>) -> Self {
        Self(owner.unwrap_or(member))
    }

    /// The defining entity's identity
    #[must_use]
    pub const fn owner(self) -> EntityId {
        self.0
    }
}
