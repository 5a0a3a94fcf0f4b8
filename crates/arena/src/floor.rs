//! Static platforms.

use engine_app::Behavior;
use engine_component::{EntityCore, PeerId, Replicated};
use engine_math::Rect;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorState {
    pub rect: Rect,
}

/// A solid rectangle players collide with. Has no behaviours.
#[derive(Debug)]
pub struct Floor {
    core: EntityCore,
    pub state: FloorState,
}

impl Floor {
    #[must_use]
    pub fn new(rect: Rect, updater: PeerId) -> Self {
        Self {
            core: EntityCore::spawn(updater),
            state: FloorState { rect },
        }
    }

    #[must_use]
    pub fn with_core(core: EntityCore, rect: Rect) -> Self {
        Self {
            core,
            state: FloorState { rect },
        }
    }
}

impl Replicated for Floor {
    type State = FloorState;

    fn from_parts(core: EntityCore, state: FloorState) -> Self {
        Self { core, state }
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn state(&self) -> &FloorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FloorState {
        &mut self.state
    }
}

impl Behavior for Floor {}
