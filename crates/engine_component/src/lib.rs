//! # engine_component
//!
//! The identity model of the replicated world: what an entity is, how it is
//! serialised into an attribute mapping, how it refers to other entities, and
//! how two snapshots of it are compared.
//!
//! This crate provides:
//!
//! - [`Entity`] trait: the object-safe contract the registry stores.
//! - [`Replicated`] trait: serde-backed helper that implements [`Entity`].
//! - [`EntityId`] / [`PeerId`]: opaque string identities.
//! - [`EntityRef`]: weak, lazily resolved reference to another entity.
//! - [`diff`]: the attribute-level state differ.

pub mod diff;
pub mod entity;
pub mod error;
pub mod reference;

pub use diff::diff;
pub use entity::{AttrMap, Entity, EntityCore, EntityId, PeerId, Replicated, UPDATER_KEY};
pub use error::EntityError;
pub use reference::EntityRef;
