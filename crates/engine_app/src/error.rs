//! World-level error types.

use engine_component::{EntityError, EntityId};
use engine_net::NetError;

/// Errors raised by the entity registry and its type map.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// An entity with this id is already registered.
    #[error("entity '{0}' is already registered")]
    DuplicateId(EntityId),

    /// No type-map entry exists for this name or concrete type.
    #[error("unknown entity type '{0}'")]
    UnknownEntityType(String),

    /// The entity's own serialisation hooks failed.
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Errors surfaced by world operations and event handlers.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// What every event handler returns.
pub type HandlerResult = Result<(), WorldError>;
