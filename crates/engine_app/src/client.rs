//! Client role.

use std::net::ToSocketAddrs;

use engine_component::PeerId;
use engine_net::{Inbound, ServerLink};
use tracing::warn;

use crate::bus::Subscriber;
use crate::config::WorldConfig;
use crate::error::WorldError;
use crate::events::{ReceivedUpdates, ServerDisconnected, Tick};
use crate::world::{Transport, World};

impl World {
    /// Connect to the host, announce `config.identity`, and build the client
    /// world. Everything the client owns is replicated to the host, which
    /// relays it to the other clients.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Net`] if the host cannot be reached.
    pub fn client(config: WorldConfig, addr: impl ToSocketAddrs) -> Result<Self, WorldError> {
        let link = ServerLink::connect(addr, &config.identity, config.codec())?;
        let mut world = Self::with_transport(config, Transport::Client(link));
        world.queues.add_destination(PeerId::server());

        world.subscribe::<Tick, _>(Subscriber::Host, |world, _| {
            poll_server(world);
            Ok(())
        });
        world.subscribe::<ServerDisconnected, _>(Subscriber::Host, |world, _| {
            world.stop();
            Ok(())
        });
        Ok(world)
    }

    /// Whether the link to the host is still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.transport, Transport::Client(_))
    }
}

fn poll_server(world: &mut World) {
    let Transport::Client(link) = &mut world.transport else {
        return;
    };
    match link.poll_batches() {
        Ok(batches) => {
            let count = batches.len();
            for batch in batches {
                world.enqueue_inbound(Inbound {
                    from: PeerId::server(),
                    updates: batch.updates,
                });
            }
            world.dispatch(&ReceivedUpdates { batches: count });
        }
        Err(err) => {
            warn!(%err, "lost connection to server");
            world.transport = Transport::Offline;
            world.queues.remove_destination(&PeerId::server());
            world.dispatch(&ServerDisconnected);
        }
    }
}
