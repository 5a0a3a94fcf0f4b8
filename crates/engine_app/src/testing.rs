//! Small entity types shared by the unit tests.

use engine_component::{AttrMap, EntityCore, EntityId, EntityRef, PeerId, Replicated};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::{EventBus, Subscriber};
use crate::events::Tick;
use crate::registry::Behavior;

pub fn attrs(value: Value) -> AttrMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerState {
    pub value: i64,
}

/// Counts ticks in `value` while it is locally owned.
#[derive(Debug)]
pub struct Marker {
    pub core: EntityCore,
    pub state: MarkerState,
}

impl Marker {
    pub fn new(id: &str, updater: &str, value: i64) -> Self {
        Self {
            core: EntityCore::new(EntityId::from(id), PeerId::from(updater)),
            state: MarkerState { value },
        }
    }
}

impl Replicated for Marker {
    type State = MarkerState;

    fn from_parts(core: EntityCore, state: MarkerState) -> Self {
        Self { core, state }
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn state(&self) -> &MarkerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MarkerState {
        &mut self.state
    }
}

impl Behavior for Marker {
    fn subscribe(id: &EntityId, bus: &mut EventBus) {
        let me = id.clone();
        bus.subscribe::<Tick, _>(Subscriber::Entity(id.clone()), move |world, _| {
            world.with_entity_mut::<Marker, _>(&me, |marker, _| marker.state.value += 1);
            Ok(())
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedState {
    pub target: EntityRef,
}

/// Holds one weak reference.
#[derive(Debug)]
pub struct Tagged {
    pub core: EntityCore,
    pub state: TaggedState,
}

impl Replicated for Tagged {
    type State = TaggedState;

    fn from_parts(core: EntityCore, state: TaggedState) -> Self {
        Self { core, state }
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn state(&self) -> &TaggedState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TaggedState {
        &mut self.state
    }

    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        vec![&mut self.state.target]
    }
}

impl Behavior for Tagged {}
