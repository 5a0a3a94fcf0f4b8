//! Entity registry and type map.
//!
//! The registry exclusively owns every live entity, keyed by id. Entities
//! refer to each other only through [`EntityRef`](engine_component::EntityRef)
//! ids, which the resolution pass promotes once their target is live.
//!
//! The [`TypeMap`] maps wire type names to factories so the registry can
//! rebuild entities from `create` records without naming concrete types.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use engine_component::{AttrMap, Entity, EntityError, EntityId, PeerId, Replicated};
use tracing::debug;

use crate::bus::EventBus;
use crate::error::RegistryError;

/// Builds an entity from a `create` payload.
pub type Factory = fn(EntityId, AttrMap) -> Result<Box<dyn Entity>, EntityError>;

/// Subscribes an entity's behaviours on the bus.
pub type Installer = fn(&EntityId, &mut EventBus);

/// An entity type the world can construct and animate.
///
/// `subscribe` is called once for every entity of this type that enters the
/// registry, whether it was spawned locally or decoded from the wire. The
/// dispatch filter keeps behaviours of entities owned by other peers from
/// running.
pub trait Behavior: Replicated {
    fn subscribe(id: &EntityId, bus: &mut EventBus) {
        let _ = (id, bus);
    }
}

/// One type-map entry.
#[derive(Debug, Clone, Copy)]
pub struct EntityType {
    pub type_id: TypeId,
    pub create: Factory,
    pub subscribe: Installer,
}

fn create_boxed<T: Behavior>(id: EntityId, data: AttrMap) -> Result<Box<dyn Entity>, EntityError> {
    Ok(Box::new(T::from_wire(id, data)?))
}

/// Wire type name to constructor, and back.
#[derive(Debug, Default)]
pub struct TypeMap {
    by_name: BTreeMap<String, EntityType>,
    names: HashMap<TypeId, String>,
}

impl TypeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`. Re-registering a name or a type replaces
    /// the earlier mapping.
    pub fn register<T: Behavior>(&mut self, name: impl Into<String>) {
        let name = name.into();
        let entry = EntityType {
            type_id: TypeId::of::<T>(),
            create: create_boxed::<T>,
            subscribe: <T as Behavior>::subscribe,
        };
        if let Some(previous) = self.by_name.insert(name.clone(), entry) {
            self.names.remove(&previous.type_id);
        }
        self.names.retain(|_, existing| *existing != name);
        self.names.insert(entry.type_id, name);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.by_name.get(name)
    }

    /// The wire name registered for a concrete type.
    #[must_use]
    pub fn name_of(&self, type_id: TypeId) -> Option<&str> {
        self.names.get(&type_id).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

/// All live entities of one world.
#[derive(Default)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, Box<dyn Entity>>,
    /// Entities temporarily lent out to a behaviour, with their updater.
    checked_out: BTreeMap<EntityId, PeerId>,
    /// Checked-out entities removed while lent out.
    tombstones: BTreeSet<EntityId>,
    types: TypeMap,
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .field("checked_out", &self.checked_out)
            .field("types", &self.types)
            .finish()
    }
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeMap {
        &mut self.types
    }

    /// Insert an entity under its id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] if the id is already live.
    pub fn register(&mut self, entity: Box<dyn Entity>) -> Result<(), RegistryError> {
        let id = entity.id().clone();
        if self.contains(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Construct an entity through the type map and register it. Returns
    /// the type-map entry so the caller can subscribe its behaviours.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntityType`] if `type_name` is not
    /// mapped, [`RegistryError::DuplicateId`] if `id` is live, or
    /// [`RegistryError::Entity`] if the payload does not decode.
    pub fn create_from_wire(
        &mut self,
        type_name: &str,
        id: EntityId,
        data: AttrMap,
    ) -> Result<EntityType, RegistryError> {
        let entry = *self
            .types
            .get(type_name)
            .ok_or_else(|| RegistryError::UnknownEntityType(type_name.to_string()))?;
        if self.contains(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        let entity = (entry.create)(id, data)?;
        self.register(entity)?;
        Ok(entry)
    }

    /// Remove an entity. Removing an absent id is a no-op; duplicate and late
    /// deletes are expected under network jitter. Returns whether anything
    /// was removed.
    pub fn remove(&mut self, id: &EntityId) -> bool {
        if self.entities.remove(id).is_some() {
            return true;
        }
        if self.checked_out.remove(id).is_some() {
            self.tombstones.insert(id.clone());
            return true;
        }
        debug!(entity_id = %id, "ignoring removal of absent entity");
        false
    }

    /// Promote every unresolved reference whose target is live. Returns the
    /// number of references still pending.
    pub fn resolve_all(&mut self) -> usize {
        let live: BTreeSet<EntityId> = self.ids().cloned().collect();
        let is_live = |id: &EntityId| live.contains(id);
        self.entities
            .values_mut()
            .map(|entity| entity.resolve_references(&is_live))
            .sum()
    }

    /// The wire name of an entity's concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntityType`] if the type was never
    /// registered.
    pub fn lookup_type_name(&self, entity: &dyn Entity) -> Result<&str, RegistryError> {
        let type_id = entity.as_any().type_id();
        self.types
            .name_of(type_id)
            .ok_or_else(|| RegistryError::UnknownEntityType(format!("{type_id:?}")))
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&dyn Entity> {
        self.entities.get(id).map(|entity| entity.as_ref())
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut dyn Entity> {
        match self.entities.get_mut(id) {
            Some(entity) => Some(entity.as_mut()),
            None => None,
        }
    }

    /// Typed lookup.
    #[must_use]
    pub fn get_as<T: Entity>(&self, id: &EntityId) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_as_mut<T: Entity>(&mut self, id: &EntityId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// Live, including an entity currently lent to a behaviour.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id) || self.checked_out.contains_key(id)
    }

    /// The updater of a live entity, checked out or not.
    #[must_use]
    pub fn updater_of(&self, id: &EntityId) -> Option<&PeerId> {
        self.entities
            .get(id)
            .map(|entity| entity.updater())
            .or_else(|| self.checked_out.get(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys().chain(self.checked_out.keys())
    }

    /// Entities currently in the map, in id order. Checked-out entities are
    /// not visited.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Entity> {
        self.entities.values().map(|entity| entity.as_ref())
    }

    /// Ids of entities updated by `peer`.
    #[must_use]
    pub fn owned_by(&self, peer: &PeerId) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, entity)| entity.updater() == peer)
            .map(|(id, _)| id.clone())
            .chain(
                self.checked_out
                    .iter()
                    .filter(|(_, updater)| *updater == peer)
                    .map(|(id, _)| id.clone()),
            )
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len() + self.checked_out.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lend an entity out of the map.
    pub(crate) fn check_out(&mut self, id: &EntityId) -> Option<Box<dyn Entity>> {
        let entity = self.entities.remove(id)?;
        self.checked_out.insert(id.clone(), entity.updater().clone());
        Some(entity)
    }

    /// Return a lent entity. Returns `false`, dropping the entity, if it was
    /// removed while checked out.
    pub(crate) fn check_in(&mut self, entity: Box<dyn Entity>) -> bool {
        let id = entity.id().clone();
        if self.tombstones.remove(&id) {
            return false;
        }
        self.checked_out.remove(&id);
        self.entities.insert(id, entity);
        true
    }
}
