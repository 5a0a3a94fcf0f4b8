//! Gameplay events.

use engine_app::Event;
use engine_component::EntityId;

/// A player came down onto a floor this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Landed {
    pub entity: EntityId,
    /// Vertical speed just before touching down.
    pub impact: f32,
}

impl Event for Landed {}
