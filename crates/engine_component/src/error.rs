//! Entity-level error types.

/// Errors raised while serialising, constructing, or updating an entity.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// The entity state could not be converted to a JSON value.
    #[error("failed to serialise entity state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Wire data could not be converted into the entity state.
    #[error("failed to deserialise entity state: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// The entity state serialised to something other than a JSON object.
    #[error("entity state must serialise to an object, got {0}")]
    NotAnObject(&'static str),

    /// A required attribute was missing or had the wrong shape.
    #[error("missing or invalid attribute '{0}'")]
    MissingAttribute(&'static str),
}
