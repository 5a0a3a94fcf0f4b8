//! Built-in event types.
//!
//! Any `'static` type implementing [`Event`] can be dispatched; the ones
//! below are fired by the scheduler and the replication roles. Gameplay
//! crates define their own alongside.

use engine_component::PeerId;

/// Marker for values that can travel through the
/// [`EventBus`](crate::EventBus).
pub trait Event: 'static {}

/// Fired once on the host before the first tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStart;

/// Fired once on a client before the first tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStart;

/// First phase of a simulation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickStart {
    pub tick_id: u64,
}

/// Main simulation phase. Entity behaviours subscribe here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub tick_id: u64,
    /// Seconds since the previous `TickStart`; zero on the first tick.
    pub dt: f32,
}

/// Last phase of a simulation tick. State diffing runs here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickComplete {
    pub tick_id: u64,
}

/// The network gate fired; outbound queues are flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkTick;

/// A client completed its handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub peer: PeerId,
}

/// A client's stream closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDisconnected {
    pub peer: PeerId,
}

/// The host's stream closed (client side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerDisconnected;

/// Fired once per network poll: inbound batches, possibly none, are waiting
/// to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedUpdates {
    /// Batches received by this poll.
    pub batches: usize,
}

/// Inbound batches were applied and references resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatesLoaded {
    pub applied: usize,
    /// References still waiting for their target.
    pub pending_references: usize,
}

impl Event for ServerStart {}
impl Event for ClientStart {}
impl Event for TickStart {}
impl Event for Tick {}
impl Event for TickComplete {}
impl Event for NetworkTick {}
impl Event for NewClient {}
impl Event for ClientDisconnected {}
impl Event for ServerDisconnected {}
impl Event for ReceivedUpdates {}
impl Event for UpdatesLoaded {}
