//! Host role.
//!
//! The host accepts clients, applies their batches, and relays each batch
//! verbatim to every other client. A newcomer receives the whole world as
//! synthetic `create` records before any per-tick diff reaches it. When a
//! client goes away its entities are removed and the deletes broadcast.

use std::net::{SocketAddr, ToSocketAddrs};

use engine_component::PeerId;
use engine_net::{ConnectionManager, ReplicationUpdate};
use tracing::{info, warn};

use crate::bus::Subscriber;
use crate::config::WorldConfig;
use crate::error::{HandlerResult, WorldError};
use crate::events::{ClientDisconnected, NewClient, ReceivedUpdates, Tick};
use crate::replication::Destination;
use crate::world::{Transport, World};

impl World {
    /// Bind a listener and build the host world.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Net`] if the address cannot be bound.
    pub fn host(config: WorldConfig, addr: impl ToSocketAddrs) -> Result<Self, WorldError> {
        let manager = ConnectionManager::bind(addr, config.codec(), config.handshake_timeout)?;
        let mut world = Self::with_transport(config, Transport::Host(manager));

        world.subscribe::<Tick, _>(Subscriber::Host, |world, _| {
            poll_clients(world);
            Ok(())
        });
        world.subscribe::<NewClient, _>(Subscriber::Host, |world, event| {
            send_world_snapshot(world, &event.peer)
        });
        world.subscribe::<ClientDisconnected, _>(Subscriber::Host, |world, event| {
            forget_client(world, &event.peer);
            Ok(())
        });
        Ok(world)
    }

    /// The host's listening address.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.transport {
            Transport::Host(manager) => manager.local_addr().ok(),
            _ => None,
        }
    }

    /// Connected client identities.
    #[must_use]
    pub fn clients(&self) -> Vec<PeerId> {
        match &self.transport {
            Transport::Host(manager) => manager.peers().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

fn poll_clients(world: &mut World) {
    let Transport::Host(manager) = &mut world.transport else {
        return;
    };
    for peer in manager.accept_pending() {
        world.queues.add_destination(peer.clone());
        world.dispatch(&NewClient { peer });
    }

    let Transport::Host(manager) = &mut world.transport else {
        return;
    };
    let outcome = manager.poll_inbound();

    let batches = outcome.batches.len();
    for batch in outcome.batches {
        world
            .queues
            .extend(&Destination::AllExcept(batch.from.clone()), &batch.updates);
        world.enqueue_inbound(batch);
    }
    // Every tick, so queued traffic is flushed even when nothing arrived.
    world.dispatch(&ReceivedUpdates { batches });

    for peer in outcome.disconnected {
        world.dispatch(&ClientDisconnected { peer });
    }
}

/// Late-join transfer: every live entity as a `create`, sent at once. An
/// empty world sends an empty batch.
fn send_world_snapshot(world: &mut World, peer: &PeerId) -> HandlerResult {
    let mut creates = Vec::with_capacity(world.registry.len());
    for entity in world.registry.iter() {
        let type_name = match world.registry.lookup_type_name(entity) {
            Ok(type_name) => type_name,
            Err(err) => {
                warn!(entity_id = %entity.id(), %err, "entity left out of world snapshot");
                continue;
            }
        };
        creates.push(ReplicationUpdate::create(
            entity.id().clone(),
            type_name,
            entity.serialize()?,
        ));
    }

    if let Transport::Host(manager) = &mut world.transport {
        manager.send_batch(peer, &creates)?;
        info!(%peer, entities = creates.len(), "sent world snapshot");
    }
    Ok(())
}

fn forget_client(world: &mut World, peer: &PeerId) {
    world.queues.remove_destination(peer);
    if let Transport::Host(manager) = &mut world.transport {
        manager.drop_client(peer);
    }

    let owned = world.registry.owned_by(peer);
    for id in &owned {
        if world.remove_entity(id) {
            world
                .queues
                .push(&Destination::All, ReplicationUpdate::delete(id.clone()));
        }
    }
    info!(%peer, removed = owned.len(), "client entities removed");
}
