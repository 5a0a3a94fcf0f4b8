//! Replication wire records.
//!
//! A network tick sends a JSON array of [`ReplicationUpdate`] records:
//!
//! ```text
//! { "update_type": "create" | "update" | "delete",
//!   "entity_id":   string,
//!   "entity_type": string | null,
//!   "data":        object | null }
//! ```
//!
//! `create` carries the full serialised entity and its type-map name,
//! `update` carries only changed attributes, `delete` carries nothing.

use std::fmt;
use std::str::FromStr;

use engine_component::{AttrMap, EntityId};
use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// The three replication record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum UpdateKind {
    Create,
    Update,
    Delete,
}

impl UpdateKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateKind {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(NetError::InvalidUpdateType(other.to_string())),
        }
    }
}

impl TryFrom<String> for UpdateKind {
    type Error = NetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One replication record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationUpdate {
    pub update_type: UpdateKind,
    pub entity_id: EntityId,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub data: Option<AttrMap>,
}

impl ReplicationUpdate {
    /// A full-state record that lets the receiver construct the entity.
    #[must_use]
    pub fn create(entity_id: EntityId, entity_type: impl Into<String>, data: AttrMap) -> Self {
        Self {
            update_type: UpdateKind::Create,
            entity_id,
            entity_type: Some(entity_type.into()),
            data: Some(data),
        }
    }

    /// A partial-state record carrying only changed attributes.
    #[must_use]
    pub fn update(entity_id: EntityId, data: AttrMap) -> Self {
        Self {
            update_type: UpdateKind::Update,
            entity_id,
            entity_type: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn delete(entity_id: EntityId) -> Self {
        Self {
            update_type: UpdateKind::Delete,
            entity_id,
            entity_type: None,
            data: None,
        }
    }

    /// Check that the record carries what its kind requires.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::MalformedUpdate`] for a `create` without a type or
    /// data, or an `update` without data.
    pub fn validate(&self) -> Result<(), NetError> {
        match self.update_type {
            UpdateKind::Create if self.entity_type.is_none() => Err(NetError::MalformedUpdate(
                format!("create for '{}' has no entity_type", self.entity_id),
            )),
            UpdateKind::Create | UpdateKind::Update if self.data.is_none() => {
                Err(NetError::MalformedUpdate(format!(
                    "{} for '{}' has no data",
                    self.update_type, self.entity_id
                )))
            }
            _ => Ok(()),
        }
    }
}
