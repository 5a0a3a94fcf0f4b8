//! # engine_app
//!
//! The replicated world: one authoritative host and any number of clients
//! agreeing on a shared set of entities.
//!
//! This crate provides:
//!
//! - [`EntityRegistry`] / [`TypeMap`]: entity ownership and wire-type lookup.
//! - [`EventBus`]: ordered, synchronous subscriptions.
//! - [`ReplicationQueues`]: per-destination outbound updates.
//! - [`World`]: the per-tick pipeline, plus the host and client roles.
//! - [`TickScheduler`]: simulation and network gates.
//!
//! ## Tick lifecycle
//!
//! 1. `TickStart`, `Tick`, `TickComplete` on the simulation gate.
//! 2. Inbound batches applied, references resolved, `UpdatesLoaded`.
//! 3. `NetworkTick` on the network gate flushes the queues.

pub mod bus;
mod client;
pub mod config;
pub mod error;
pub mod events;
mod host;
pub mod registry;
pub mod replication;
pub mod tick;
pub mod world;

#[cfg(test)]
mod testing;

pub use bus::{EventBus, Subscriber};
pub use config::WorldConfig;
pub use error::{HandlerResult, RegistryError, WorldError};
pub use events::Event;
pub use registry::{Behavior, EntityRegistry, EntityType, TypeMap};
pub use replication::{Destination, ReplicationQueues};
pub use tick::{Gates, TickConfig, TickScheduler};
pub use world::World;
