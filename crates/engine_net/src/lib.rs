//! # engine_net
//!
//! Replication transport for the replicated world.
//!
//! This crate provides:
//!
//! - [`messages`]: `create` / `update` / `delete` wire records.
//! - [`codec`]: JSON batch encoding with optional zlib (DEFLATE) compression.
//! - [`frame`]: length-prefixed framing over non-blocking byte streams.
//! - [`connection`]: the client's link to the host.
//! - [`manager`]: the host's listener and per-client streams.
//! - [`error`]: Network-layer error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod manager;
pub mod messages;

pub use codec::{Codec, DecodedBatch};
pub use connection::ServerLink;
pub use error::NetError;
pub use frame::FramedStream;
pub use manager::{ConnectionManager, Inbound, PollOutcome};
pub use messages::{ReplicationUpdate, UpdateKind};
