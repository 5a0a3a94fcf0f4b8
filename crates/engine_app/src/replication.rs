//! Per-destination outbound queues.
//!
//! Updates accumulate per peer between network ticks and are drained in one
//! batch per peer at flush time. Empty queues produce no traffic.

use std::collections::BTreeMap;

use engine_component::PeerId;
use engine_net::ReplicationUpdate;
use tracing::debug;

/// Where an update should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Every known peer.
    All,
    /// Every known peer except one, typically the update's origin.
    AllExcept(PeerId),
    /// A single peer.
    Peer(PeerId),
}

/// Outbound updates waiting for the next flush, one queue per connected
/// peer.
#[derive(Debug, Default)]
pub struct ReplicationQueues {
    queues: BTreeMap<PeerId, Vec<ReplicationUpdate>>,
}

impl ReplicationQueues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a destination. Existing queued updates are kept.
    pub fn add_destination(&mut self, peer: PeerId) {
        self.queues.entry(peer).or_default();
    }

    /// Stop tracking a destination, discarding anything still queued.
    pub fn remove_destination(&mut self, peer: &PeerId) -> Vec<ReplicationUpdate> {
        self.queues.remove(peer).unwrap_or_default()
    }

    #[must_use]
    pub fn has_destination(&self, peer: &PeerId) -> bool {
        self.queues.contains_key(peer)
    }

    pub fn destinations(&self) -> impl Iterator<Item = &PeerId> {
        self.queues.keys()
    }

    /// Queue a copy of `update` for every peer `destination` names.
    pub fn push(&mut self, destination: &Destination, update: ReplicationUpdate) {
        self.extend(destination, std::slice::from_ref(&update));
    }

    /// Queue copies of `updates`, in order, for every peer `destination`
    /// names. Unknown single peers are skipped.
    pub fn extend(&mut self, destination: &Destination, updates: &[ReplicationUpdate]) {
        match destination {
            Destination::Peer(peer) => match self.queues.get_mut(peer) {
                Some(queue) => queue.extend_from_slice(updates),
                None => debug!(%peer, "dropping updates for unknown destination"),
            },
            Destination::All => {
                for queue in self.queues.values_mut() {
                    queue.extend_from_slice(updates);
                }
            }
            Destination::AllExcept(excluded) => {
                for (peer, queue) in &mut self.queues {
                    if peer != excluded {
                        queue.extend_from_slice(updates);
                    }
                }
            }
        }
    }

    /// Updates waiting for `peer`.
    #[must_use]
    pub fn pending(&self, peer: &PeerId) -> &[ReplicationUpdate] {
        self.queues.get(peer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drain every non-empty queue. Destinations stay registered.
    pub fn take_batches(&mut self) -> Vec<(PeerId, Vec<ReplicationUpdate>)> {
        self.queues
            .iter_mut()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(peer, queue)| (peer.clone(), std::mem::take(queue)))
            .collect()
    }
}
