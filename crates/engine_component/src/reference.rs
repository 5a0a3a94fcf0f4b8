//! Weak cross-entity references.
//!
//! Entities never hold each other directly. They hold an [`EntityRef`] and
//! look the target up through the registry when they need it. A reference
//! decoded from the wire starts out [`EntityRef::Unresolved`] because its
//! target may arrive later in the same batch, or in a later one. The
//! registry's resolution pass promotes it once the target is live.
//!
//! On the wire both states are just the target's id string.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entity::EntityId;

/// A weak reference to another entity, by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// Target id not yet confirmed live in the local registry.
    Unresolved(EntityId),
    /// Target id was live when the reference was resolved. Lookups still go
    /// through the registry, so a later removal simply yields nothing.
    Resolved(EntityId),
}

impl EntityRef {
    /// A reference to an entity known to be live (local construction).
    #[must_use]
    pub fn resolved(id: EntityId) -> Self {
        Self::Resolved(id)
    }

    /// A placeholder pending resolution.
    #[must_use]
    pub fn unresolved(id: EntityId) -> Self {
        Self::Unresolved(id)
    }

    /// The target id, whatever the resolution state.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Unresolved(id) | Self::Resolved(id) => id,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Promote to [`EntityRef::Resolved`] if the target is live. Returns
    /// whether the reference is resolved afterwards.
    pub fn resolve(&mut self, is_live: &dyn Fn(&EntityId) -> bool) -> bool {
        if let Self::Unresolved(id) = self
            && is_live(id)
        {
            *self = Self::Resolved(id.clone());
        }
        self.is_resolved()
    }
}

impl Serialize for EntityRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EntityRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        EntityId::deserialize(deserializer).map(Self::Unresolved)
    }
}
