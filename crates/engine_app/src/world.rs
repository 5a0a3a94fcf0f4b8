//! The replicated world.
//!
//! A [`World`] ties together the entity registry, the event bus, the
//! outbound replication queues, and the transport for one peer. It runs the
//! per-tick pipeline:
//!
//! 1. `TickStart`, `Tick`, `TickComplete` are dispatched in order. The
//!    role's network handler polls sockets during `Tick`; entity behaviours
//!    mutate state; `TickComplete` diffs every locally owned entity against
//!    its previous snapshot and queues `create`/`update` records.
//! 2. Received batches are applied in arrival order, then every unresolved
//!    reference is retried, then `UpdatesLoaded` fires and the outbound
//!    queues are flushed, so relayed traffic leaves in the same tick.
//! 3. On `NetworkTick` each non-empty queue is sent as one batch.

use std::any::TypeId;
use std::time::Instant;

use engine_component::{Entity, EntityId, PeerId, diff};
use engine_net::{ConnectionManager, Inbound, ReplicationUpdate, ServerLink, UpdateKind};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Subscriber};
use crate::config::WorldConfig;
use crate::error::{HandlerResult, RegistryError, WorldError};
use crate::events::{
    ClientStart, Event, NetworkTick, ReceivedUpdates, ServerStart, Tick, TickComplete, TickStart,
    UpdatesLoaded,
};
use crate::registry::{Behavior, EntityRegistry};
use crate::replication::{Destination, ReplicationQueues};

/// How this world talks to its peers.
#[derive(Debug)]
pub(crate) enum Transport {
    /// No sockets. Used by tests and after the server goes away.
    Offline,
    Host(ConnectionManager),
    Client(ServerLink),
}

/// One peer's view of the replicated world, together with the transport
/// it uses to reach its peers.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    pub(crate) registry: EntityRegistry,
    bus: EventBus,
    pub(crate) queues: ReplicationQueues,
    /// Batches received this tick, waiting for `ReceivedUpdates`.
    pub(crate) inbound: Vec<Inbound>,
    pub(crate) transport: Transport,
    tick_id: u64,
    last_tick_start: Option<Instant>,
    dt: f32,
    running: bool,
}

impl World {
    pub(crate) fn with_transport(config: WorldConfig, transport: Transport) -> Self {
        let mut world = Self {
            config,
            registry: EntityRegistry::new(),
            bus: EventBus::new(),
            queues: ReplicationQueues::new(),
            inbound: Vec::new(),
            transport,
            tick_id: 0,
            last_tick_start: None,
            dt: 0.0,
            running: true,
        };

        world.subscribe::<ReceivedUpdates, _>(Subscriber::Host, |world, _| {
            world.load_updates();
            Ok(())
        });
        world.subscribe::<UpdatesLoaded, _>(Subscriber::Host, |world, _| {
            world.flush();
            Ok(())
        });
        world.subscribe::<TickComplete, _>(Subscriber::Host, |world, _| {
            world.detect_updates();
            Ok(())
        });
        world.subscribe::<NetworkTick, _>(Subscriber::Host, |world, _| {
            world.flush();
            Ok(())
        });
        world
    }

    /// A world with no network transport.
    #[must_use]
    pub fn offline(config: WorldConfig) -> Self {
        Self::with_transport(config, Transport::Offline)
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[must_use]
    pub fn identity(&self) -> &PeerId {
        &self.config.identity
    }

    #[must_use]
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    #[must_use]
    pub fn queues(&self) -> &ReplicationQueues {
        &self.queues
    }

    pub fn queues_mut(&mut self) -> &mut ReplicationQueues {
        &mut self.queues
    }

    /// Simulation ticks run so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Seconds between the last two `TickStart`s.
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ask the tick loop to stop after the current iteration.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Add `T` to the type map under `name`.
    pub fn register_type<T: Behavior>(&mut self, name: &str) {
        self.registry.types_mut().register::<T>(name);
    }

    pub fn subscribe<E, F>(&mut self, owner: Subscriber, handler: F)
    where
        E: Event,
        F: Fn(&mut World, &E) -> HandlerResult + 'static,
    {
        self.bus.subscribe(owner, handler);
    }

    /// Invoke every handler for `E` in subscription order.
    ///
    /// A handler owned by an entity runs only if that entity is live and its
    /// updater is this world's identity. A failing handler is logged and
    /// the remaining handlers still run.
    pub fn dispatch<E: Event>(&mut self, event: &E) {
        for subscription in self.bus.subscribers::<E>() {
            if !self.is_authorized(subscription.owner()) {
                continue;
            }
            if let Err(err) = (subscription.handler)(self, event) {
                warn!(
                    event = std::any::type_name::<E>(),
                    owner = ?subscription.owner(),
                    %err,
                    "event handler failed"
                );
            }
        }
    }

    fn is_authorized(&self, owner: &Subscriber) -> bool {
        match owner {
            Subscriber::Host => true,
            Subscriber::Entity(id) => self.registry.updater_of(id) == Some(&self.config.identity),
        }
    }

    /// Register a locally created entity and subscribe its behaviours. It is
    /// replicated as a `create` at the next `TickComplete`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntityType`] if `T` has no type-map
    /// entry, or [`RegistryError::DuplicateId`].
    pub fn spawn<T: Entity>(&mut self, entity: T) -> Result<EntityId, WorldError> {
        let types = self.registry.types();
        let entry = types
            .name_of(TypeId::of::<T>())
            .and_then(|name| types.get(name))
            .copied()
            .ok_or_else(|| {
                RegistryError::UnknownEntityType(std::any::type_name::<T>().to_string())
            })?;

        let id = entity.id().clone();
        self.registry.register(Box::new(entity))?;
        (entry.subscribe)(&id, &mut self.bus);
        debug!(entity_id = %id, "spawned entity");
        Ok(id)
    }

    /// Remove an entity and tell every peer. Returns `false` if it was not
    /// live.
    pub fn despawn(&mut self, id: &EntityId) -> bool {
        if !self.remove_entity(id) {
            return false;
        }
        self.queues
            .push(&Destination::All, ReplicationUpdate::delete(id.clone()));
        true
    }

    /// Remove an entity and its subscriptions without replicating anything.
    pub(crate) fn remove_entity(&mut self, id: &EntityId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            self.bus.unsubscribe_entity(id);
        }
        removed
    }

    /// Queue a hand-built update.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::MalformedUpdate`](engine_net::NetError) if the
    /// record lacks a field its kind requires, or
    /// [`RegistryError::UnknownEntityType`] if a `create` names an unmapped
    /// type.
    pub fn network_update(
        &mut self,
        destination: &Destination,
        update: ReplicationUpdate,
    ) -> Result<(), WorldError> {
        update.validate()?;
        if let Some(type_name) = &update.entity_type
            && update.update_type == UpdateKind::Create
            && self.registry.types().get(type_name).is_none()
        {
            return Err(RegistryError::UnknownEntityType(type_name.clone()).into());
        }
        self.queues.push(destination, update);
        Ok(())
    }

    /// Run `f` with exclusive access to both the entity and the world.
    ///
    /// The entity is lent out of the registry for the call: it is invisible
    /// to registry iteration, still counts as live for references and
    /// authorisation, and is dropped on return if it was removed meanwhile.
    /// Returns `None` if the entity is absent or is not a `T`.
    pub fn with_entity_mut<T: Entity, R>(
        &mut self,
        id: &EntityId,
        f: impl FnOnce(&mut T, &mut World) -> R,
    ) -> Option<R> {
        let mut entity = self.registry.check_out(id)?;
        let result = entity
            .as_any_mut()
            .downcast_mut::<T>()
            .map(|typed| f(typed, self));
        if !self.registry.check_in(entity) {
            debug!(entity_id = %id, "entity removed during its own behaviour");
        }
        result
    }

    /// Hand a received batch to the next `ReceivedUpdates`.
    pub fn enqueue_inbound(&mut self, batch: Inbound) {
        self.inbound.push(batch);
    }

    /// Apply every queued inbound batch, resolve references, and dispatch
    /// [`UpdatesLoaded`].
    pub fn load_updates(&mut self) {
        let batches = std::mem::take(&mut self.inbound);
        let mut applied = 0;

        for batch in batches {
            for update in batch.updates {
                let (kind, id) = (update.update_type, update.entity_id.clone());
                match self.apply_record(update) {
                    Ok(()) => applied += 1,
                    Err(WorldError::Registry(RegistryError::UnknownEntityType(entity_type))) => {
                        warn!(entity_id = %id, %entity_type, from = %batch.from, "dropping create for unknown entity type");
                    }
                    Err(err) => {
                        warn!(entity_id = %id, %kind, from = %batch.from, %err, "dropping replication record");
                    }
                }
            }
        }

        let pending_references = self.registry.resolve_all();
        if pending_references > 0 {
            debug!(pending_references, "references still waiting for their target");
        }
        self.dispatch(&UpdatesLoaded {
            applied,
            pending_references,
        });
    }

    fn apply_record(&mut self, update: ReplicationUpdate) -> Result<(), WorldError> {
        let ReplicationUpdate {
            update_type,
            entity_id,
            entity_type,
            data,
        } = update;
        let data = data.unwrap_or_default();

        match update_type {
            UpdateKind::Create => {
                if let Some(entity) = self.registry.get_mut(&entity_id) {
                    debug!(entity_id = %entity_id, "create for live entity applied as update");
                    entity.apply_update(&data)?;
                    return Ok(());
                }
                let entity_type = entity_type.unwrap_or_default();
                let entry = self
                    .registry
                    .create_from_wire(&entity_type, entity_id.clone(), data)?;
                (entry.subscribe)(&entity_id, &mut self.bus);
            }
            UpdateKind::Update => match self.registry.get_mut(&entity_id) {
                Some(entity) => entity.apply_update(&data)?,
                None => debug!(entity_id = %entity_id, "skipping update for unknown entity"),
            },
            UpdateKind::Delete => {
                self.remove_entity(&entity_id);
            }
        }
        Ok(())
    }

    /// Diff every locally owned entity against its previous snapshot and
    /// queue the result for every destination.
    pub fn detect_updates(&mut self) {
        for id in self.registry.owned_by(&self.config.identity) {
            let Some(entity) = self.registry.get(&id) else {
                continue;
            };
            let current = match entity.serialize() {
                Ok(current) => current,
                Err(err) => {
                    warn!(entity_id = %id, %err, "failed to serialise entity");
                    continue;
                }
            };

            let update = match entity.last_tick_snapshot() {
                None => match self.registry.lookup_type_name(entity) {
                    Ok(type_name) => Some(ReplicationUpdate::create(
                        id.clone(),
                        type_name,
                        current.clone(),
                    )),
                    Err(err) => {
                        warn!(entity_id = %id, %err, "entity cannot be replicated");
                        None
                    }
                },
                Some(previous) => {
                    let delta = diff(previous, &current);
                    (!delta.is_empty()).then(|| ReplicationUpdate::update(id.clone(), delta))
                }
            };

            if let Some(update) = update {
                self.queues.push(&Destination::All, update);
            }
            if let Some(entity) = self.registry.get_mut(&id) {
                entity.set_last_tick_snapshot(Some(current));
            }
        }
    }

    /// Send each non-empty queue as one batch.
    pub fn flush(&mut self) {
        for (peer, batch) in self.queues.take_batches() {
            let sent = match &mut self.transport {
                Transport::Host(manager) => manager.send_batch(&peer, &batch),
                Transport::Client(link) => link.send_batch(&batch),
                Transport::Offline => {
                    debug!(%peer, updates = batch.len(), "offline, discarding batch");
                    continue;
                }
            };
            match sent {
                Ok(()) => debug!(%peer, updates = batch.len(), "flushed batch"),
                Err(err) => warn!(%peer, %err, "failed to send batch"),
            }
        }
    }

    /// Fire the role's start event.
    pub fn start(&mut self) {
        info!(identity = %self.config.identity, "world starting");
        if self.config.identity.is_server() {
            self.dispatch(&ServerStart);
        } else {
            self.dispatch(&ClientStart);
        }
    }

    /// Dispatch `TickStart`, `Tick`, and `TickComplete`, in that order.
    pub fn run_simulation_tick(&mut self) {
        let now = Instant::now();
        self.dt = self
            .last_tick_start
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_tick_start = Some(now);
        self.tick_id += 1;

        let tick_id = self.tick_id;
        self.dispatch(&TickStart { tick_id });
        self.dispatch(&Tick {
            tick_id,
            dt: self.dt,
        });
        self.dispatch(&TickComplete { tick_id });
    }

    pub fn run_network_tick(&mut self) {
        self.dispatch(&NetworkTick);
    }
}
