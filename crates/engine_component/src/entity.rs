//! Entity identity and the serialisation contract.
//!
//! An entity is identified by an opaque [`EntityId`] string that is stable
//! across the network, and is mutated only by the peer named in its
//! `updater`. The registry stores entities as `Box<dyn Entity>`; gameplay
//! types normally implement [`Replicated`] and get [`Entity`] for free.

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EntityError;
use crate::reference::EntityRef;

/// A serialised entity: attribute name to wire value.
pub type AttrMap = serde_json::Map<String, Value>;

/// The attribute under which the updater identity travels on the wire.
pub const UPDATER_KEY: &str = "updater";

/// A unique, network-stable entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Allocate a fresh random identifier (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The identity of a peer: `"server"` for the host, a client-chosen string
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// The host's identity.
    pub const SERVER: &'static str = "server";

    /// Returns the host identity.
    #[must_use]
    pub fn server() -> Self {
        Self(Self::SERVER.to_string())
    }

    /// Allocate a fresh random client identity (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns `true` if this is the host identity.
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.0 == Self::SERVER
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Bookkeeping every entity carries regardless of its gameplay state.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCore {
    /// Assigned at creation and never reassigned.
    pub id: EntityId,
    /// The peer authorised to mutate this entity.
    pub updater: PeerId,
    /// Serialised form captured at the previous `TickComplete`. `None` until
    /// the entity has been diffed once.
    pub last_tick_snapshot: Option<AttrMap>,
}

impl EntityCore {
    /// Core for an entity with a known id (e.g. decoded from the wire).
    #[must_use]
    pub fn new(id: EntityId, updater: PeerId) -> Self {
        Self {
            id,
            updater,
            last_tick_snapshot: None,
        }
    }

    /// Core for a locally created entity with a fresh id.
    #[must_use]
    pub fn spawn(updater: PeerId) -> Self {
        Self::new(EntityId::generate(), updater)
    }
}

/// The object-safe contract the registry stores and the replication layer
/// drives.
pub trait Entity: Any {
    /// The entity's network-stable id.
    fn id(&self) -> &EntityId;

    /// The peer authorised to mutate this entity.
    fn updater(&self) -> &PeerId;

    /// Snapshot captured at the previous tick, if any.
    fn last_tick_snapshot(&self) -> Option<&AttrMap>;

    /// Replace the previous-tick snapshot.
    fn set_last_tick_snapshot(&mut self, snapshot: Option<AttrMap>);

    /// Full serialised attribute mapping, including [`UPDATER_KEY`].
    fn serialize(&self) -> Result<AttrMap, EntityError>;

    /// Apply a (possibly partial) attribute mapping received from the wire.
    fn apply_update(&mut self, delta: &AttrMap) -> Result<(), EntityError>;

    /// Promote unresolved references whose target is live. Returns how many
    /// references remain unresolved.
    fn resolve_references(&mut self, is_live: &dyn Fn(&EntityId) -> bool) -> usize;

    /// Returns `self` as [`Any`], for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Returns `self` as mutable [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Entity {
    /// Downcast to a concrete entity type.
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete entity type.
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Serde-backed entity definition.
///
/// Gameplay types split themselves into an [`EntityCore`], a replicated
/// `State` (everything that travels on the wire), and any purely local
/// runtime fields. Updates rewrite only `State`, so local fields survive.
///
/// # Examples
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use engine_component::{EntityCore, Replicated};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct CounterState {
///     count: u32,
/// }
///
/// struct Counter {
///     core: EntityCore,
///     state: CounterState,
/// }
///
/// impl Replicated for Counter {
///     type State = CounterState;
///
///     fn from_parts(core: EntityCore, state: CounterState) -> Self {
///         Self { core, state }
///     }
///     fn core(&self) -> &EntityCore { &self.core }
///     fn core_mut(&mut self) -> &mut EntityCore { &mut self.core }
///     fn state(&self) -> &CounterState { &self.state }
///     fn state_mut(&mut self) -> &mut CounterState { &mut self.state }
/// }
/// ```
pub trait Replicated: Any + Sized {
    /// Replicated attributes. Must serialise to a JSON object and must not
    /// contain a field named [`UPDATER_KEY`].
    type State: Serialize + DeserializeOwned;

    /// Assemble an entity from its core and a decoded state.
    fn from_parts(core: EntityCore, state: Self::State) -> Self;

    /// Returns a reference to the entity's bookkeeping.
    fn core(&self) -> &EntityCore;

    /// Returns a mutable reference to the entity's bookkeeping.
    fn core_mut(&mut self) -> &mut EntityCore;

    /// Returns a reference to the replicated state.
    fn state(&self) -> &Self::State;

    /// Returns a mutable reference to the replicated state.
    fn state_mut(&mut self) -> &mut Self::State;

    /// Every weak reference held in `State`, for the resolution pass.
    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        Vec::new()
    }

    /// Build an entity from a `create` payload.
    fn from_wire(id: EntityId, mut data: AttrMap) -> Result<Self, EntityError> {
        let updater = match data.remove(UPDATER_KEY) {
            Some(Value::String(updater)) => PeerId::from(updater),
            _ => return Err(EntityError::MissingAttribute(UPDATER_KEY)),
        };
        let state =
            serde_json::from_value(Value::Object(data)).map_err(EntityError::Deserialize)?;
        Ok(Self::from_parts(EntityCore::new(id, updater), state))
    }
}

fn state_to_map<S: Serialize>(state: &S) -> Result<AttrMap, EntityError> {
    match serde_json::to_value(state).map_err(EntityError::Serialize)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(EntityError::NotAnObject("null")),
        Value::Bool(_) => Err(EntityError::NotAnObject("bool")),
        Value::Number(_) => Err(EntityError::NotAnObject("number")),
        Value::String(_) => Err(EntityError::NotAnObject("string")),
        Value::Array(_) => Err(EntityError::NotAnObject("array")),
    }
}

impl<T: Replicated> Entity for T {
    fn id(&self) -> &EntityId {
        &Replicated::core(self).id
    }

    fn updater(&self) -> &PeerId {
        &Replicated::core(self).updater
    }

    fn last_tick_snapshot(&self) -> Option<&AttrMap> {
        Replicated::core(self).last_tick_snapshot.as_ref()
    }

    fn set_last_tick_snapshot(&mut self, snapshot: Option<AttrMap>) {
        self.core_mut().last_tick_snapshot = snapshot;
    }

    fn serialize(&self) -> Result<AttrMap, EntityError> {
        let mut map = state_to_map(self.state())?;
        map.insert(
            UPDATER_KEY.to_string(),
            Value::String(Replicated::core(self).updater.to_string()),
        );
        Ok(map)
    }

    fn apply_update(&mut self, delta: &AttrMap) -> Result<(), EntityError> {
        let mut merged = state_to_map(self.state())?;
        let mut state_touched = false;
        let mut updater = None;

        for (key, value) in delta {
            if key == UPDATER_KEY {
                match value {
                    Value::String(peer) => updater = Some(PeerId::from(peer.as_str())),
                    _ => return Err(EntityError::MissingAttribute(UPDATER_KEY)),
                }
            } else {
                merged.insert(key.clone(), value.clone());
                state_touched = true;
            }
        }

        // Decode before touching anything so a rejected delta leaves the
        // entity unchanged.
        let state = if state_touched {
            Some(serde_json::from_value(Value::Object(merged)).map_err(EntityError::Deserialize)?)
        } else {
            None
        };

        if let Some(state) = state {
            // Decoded references come back unresolved; a target that was
            // already resolved stays resolved.
            let resolved: Vec<EntityId> = self
                .references_mut()
                .into_iter()
                .filter(|reference| reference.is_resolved())
                .map(|reference| reference.id().clone())
                .collect();
            *self.state_mut() = state;
            for reference in self.references_mut() {
                reference.resolve(&|id: &EntityId| resolved.contains(id));
            }
        }
        if let Some(updater) = updater {
            self.core_mut().updater = updater;
        }
        Ok(())
    }

    fn resolve_references(&mut self, is_live: &dyn Fn(&EntityId) -> bool) -> usize {
        self.references_mut()
            .into_iter()
            .map(|reference| reference.resolve(is_live))
            .filter(|resolved| !resolved)
            .count()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
