//! Weapons carried by players.

use engine_app::events::Tick;
use engine_app::{Behavior, EntityRegistry, EventBus, Subscriber};
use engine_component::{EntityCore, EntityId, EntityRef, PeerId, Replicated};
use engine_math::{Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::player::Player;

/// Where a carried weapon sits relative to its owner's top-left corner.
pub const CARRY_OFFSET: Vec2 = Vec2::new(0.0, -50.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponState {
    pub rect: Rect,
    pub ammo: u32,
    pub max_ammo: u32,
    pub attack_cooldown: u32,
    pub owner: EntityRef,
}

#[derive(Debug)]
pub struct Weapon {
    core: EntityCore,
    pub state: WeaponState,
}

impl Weapon {
    /// A two-shell shotgun held by `owner`.
    #[must_use]
    pub fn shotgun(owner: EntityRef, updater: PeerId) -> Self {
        Self {
            core: EntityCore::spawn(updater),
            state: WeaponState {
                rect: Rect::new(0.0, 0.0, 39.0, 11.0),
                ammo: 2,
                max_ammo: 2,
                attack_cooldown: 1,
                owner,
            },
        }
    }

    /// Snap to the owner's position. Does nothing while the owner is
    /// unresolved or gone.
    pub fn follow_owner(&mut self, registry: &EntityRegistry) -> bool {
        if !self.state.owner.is_resolved() {
            return false;
        }
        let Some(owner) = registry.get_as::<Player>(self.state.owner.id()) else {
            return false;
        };
        let anchor = owner.state.rect.translated(CARRY_OFFSET);
        self.state.rect.x = anchor.x;
        self.state.rect.y = anchor.y;
        true
    }
}

impl Replicated for Weapon {
    type State = WeaponState;

    fn from_parts(core: EntityCore, state: WeaponState) -> Self {
        Self { core, state }
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn state(&self) -> &WeaponState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut WeaponState {
        &mut self.state
    }

    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        vec![&mut self.state.owner]
    }
}

impl Behavior for Weapon {
    fn subscribe(id: &EntityId, bus: &mut EventBus) {
        let me = id.clone();
        bus.subscribe::<Tick, _>(Subscriber::Entity(id.clone()), move |world, _| {
            world.with_entity_mut::<Weapon, _>(&me, |weapon, world| {
                weapon.follow_owner(world.registry())
            });
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_owner_requires_resolution() {
        let mut registry = EntityRegistry::new();
        let owner = Player::new(Rect::new(100.0, 200.0, 50.0, 50.0), PeerId::server());
        let owner_id = engine_component::Entity::id(&owner).clone();
        registry.register(Box::new(owner)).unwrap();

        let mut weapon = Weapon::shotgun(EntityRef::unresolved(owner_id.clone()), PeerId::server());
        assert!(!weapon.follow_owner(&registry));
        assert_eq!(weapon.state.rect.x, 0.0);

        weapon.state.owner = EntityRef::resolved(owner_id);
        assert!(weapon.follow_owner(&registry));
        assert_eq!((weapon.state.rect.x, weapon.state.rect.y), (100.0, 150.0));
        assert_eq!(weapon.state.rect.w, 39.0);
    }

    #[test]
    fn test_follow_owner_after_owner_removed() {
        let registry = EntityRegistry::new();
        let mut weapon = Weapon::shotgun(EntityRef::resolved(EntityId::from("gone")), PeerId::server());
        assert!(!weapon.follow_owner(&registry));
    }
}
