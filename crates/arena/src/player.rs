//! Player physics.
//!
//! Each tick a locally owned player runs, in subscription order: horizontal
//! sweep, vertical sweep, gravity, friction. Landing on a floor fires
//! [`Landed`], whose handler bounces the player.

use engine_app::events::Tick;
use engine_app::{Behavior, EventBus, Subscriber, World};
use engine_component::{EntityCore, EntityId, EntityRef, PeerId, Replicated};
use engine_math::{Contact, Rect, Vec2, sweep_x, sweep_y};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::Landed;
use crate::floor::Floor;

/// Added to vertical velocity each airborne tick.
pub const DEFAULT_GRAVITY: f32 = 0.05;

/// Fraction of horizontal velocity kept each tick.
pub const DEFAULT_FRICTION: f32 = 0.05;

pub const DEFAULT_HEALTH: i32 = 100;

/// Share of landing speed returned as upward velocity.
pub const BOUNCE: f32 = 0.25;

/// Landings slower than this do not bounce.
pub const MIN_BOUNCE_SPEED: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub rect: Rect,
    pub velocity: Vec2,
    pub gravity: f32,
    pub friction: f32,
    pub health: i32,
    #[serde(default)]
    pub weapon: Option<EntityRef>,
}

#[derive(Debug)]
pub struct Player {
    core: EntityCore,
    pub state: PlayerState,
    /// Local only; recomputed by every vertical sweep.
    pub airborne: bool,
}

impl Player {
    #[must_use]
    pub fn new(rect: Rect, updater: PeerId) -> Self {
        Self::with_core(EntityCore::spawn(updater), rect)
    }

    #[must_use]
    pub fn with_core(core: EntityCore, rect: Rect) -> Self {
        Self::from_parts(
            core,
            PlayerState {
                rect,
                velocity: Vec2::ZERO,
                gravity: DEFAULT_GRAVITY,
                friction: DEFAULT_FRICTION,
                health: DEFAULT_HEALTH,
                weapon: None,
            },
        )
    }

    /// Sweep along x by the current horizontal velocity.
    pub fn move_x(&mut self, obstacles: &[Rect]) -> Contact {
        let contact = sweep_x(&mut self.state.rect, self.state.velocity.x, obstacles);
        if contact == Contact::Wall {
            self.state.velocity.x = 0.0;
        }
        contact
    }

    /// Sweep along y by the current vertical velocity. Returns the landing
    /// speed if the player came down onto a floor.
    pub fn move_y(&mut self, obstacles: &[Rect]) -> Option<f32> {
        let speed = self.state.velocity.y;
        match sweep_y(&mut self.state.rect, speed, obstacles) {
            Contact::Landed => {
                self.state.velocity.y = 0.0;
                self.airborne = false;
                Some(speed)
            }
            Contact::Ceiling => {
                self.state.velocity.y = 0.0;
                self.airborne = true;
                None
            }
            Contact::None | Contact::Wall => {
                let probe = self.state.rect.translated(Vec2::new(0.0, 1.0));
                self.airborne = !obstacles.iter().any(|floor| probe.intersects(floor));
                None
            }
        }
    }

    pub fn apply_gravity(&mut self) {
        if self.airborne {
            self.state.velocity.y += self.state.gravity;
        }
    }

    pub fn apply_friction(&mut self) {
        if self.state.velocity.x != 0.0 {
            self.state.velocity.x *= self.state.friction;
        }
    }

    pub fn bounce(&mut self, impact: f32) {
        if impact >= MIN_BOUNCE_SPEED {
            self.state.velocity.y = -impact * BOUNCE;
        }
    }
}

impl Replicated for Player {
    type State = PlayerState;

    fn from_parts(core: EntityCore, state: PlayerState) -> Self {
        Self {
            core,
            state,
            airborne: true,
        }
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn state(&self) -> &PlayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PlayerState {
        &mut self.state
    }

    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        self.state.weapon.iter_mut().collect()
    }
}

/// Rects of every floor currently in the registry.
fn floor_rects(world: &World) -> Vec<Rect> {
    world
        .registry()
        .iter()
        .filter_map(|entity| entity.as_any().downcast_ref::<Floor>())
        .map(|floor| floor.state.rect)
        .collect()
}

impl Behavior for Player {
    fn subscribe(id: &EntityId, bus: &mut EventBus) {
        let owner = Subscriber::Entity(id.clone());

        let me = id.clone();
        bus.subscribe::<Tick, _>(owner.clone(), move |world, _| {
            world.with_entity_mut::<Player, _>(&me, |player, world| {
                player.move_x(&floor_rects(world))
            });
            Ok(())
        });

        let me = id.clone();
        bus.subscribe::<Tick, _>(owner.clone(), move |world, _| {
            let landed = world
                .with_entity_mut::<Player, _>(&me, |player, world| {
                    player.move_y(&floor_rects(world))
                })
                .flatten();
            if let Some(impact) = landed {
                debug!(entity_id = %me, impact, "player landed");
                world.dispatch(&Landed {
                    entity: me.clone(),
                    impact,
                });
            }
            Ok(())
        });

        let me = id.clone();
        bus.subscribe::<Tick, _>(owner.clone(), move |world, _| {
            world.with_entity_mut::<Player, _>(&me, |player, _| player.apply_gravity());
            Ok(())
        });

        let me = id.clone();
        bus.subscribe::<Tick, _>(owner.clone(), move |world, _| {
            world.with_entity_mut::<Player, _>(&me, |player, _| player.apply_friction());
            Ok(())
        });

        let me = id.clone();
        bus.subscribe::<Landed, _>(owner, move |world, landed| {
            if landed.entity == me {
                world.with_entity_mut::<Player, _>(&me, |player, _| player.bounce(landed.impact));
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use engine_app::WorldConfig;

    use super::*;

    fn floor_rect() -> Rect {
        Rect::new(0.0, 600.0, 1920.0, 20.0)
    }

    fn arena_world() -> World {
        let mut world = World::offline(WorldConfig::host());
        crate::register_types(&mut world);
        world
    }

    #[test]
    fn test_falling_player_accelerates() {
        let mut player = Player::new(Rect::new(100.0, 100.0, 50.0, 50.0), PeerId::server());
        assert_eq!(player.move_y(&[floor_rect()]), None);
        assert!(player.airborne);
        player.apply_gravity();
        player.apply_gravity();
        assert!((player.state.velocity.y - 2.0 * DEFAULT_GRAVITY).abs() < f32::EPSILON);
    }

    #[test]
    fn test_landing_stops_and_grounds() {
        let mut player = Player::new(Rect::new(100.0, 545.0, 50.0, 50.0), PeerId::server());
        player.state.velocity.y = 8.0;
        assert_eq!(player.move_y(&[floor_rect()]), Some(8.0));
        assert_eq!(player.state.rect.bottom(), 600.0);
        assert_eq!(player.state.velocity.y, 0.0);
        assert!(!player.airborne);

        player.apply_gravity();
        assert_eq!(player.move_y(&[floor_rect()]), None);
        assert!(!player.airborne);
    }

    #[test]
    fn test_friction_and_bounce() {
        let mut player = Player::new(Rect::new(0.0, 0.0, 10.0, 10.0), PeerId::server());
        player.state.velocity.x = 10.0;
        player.apply_friction();
        assert!((player.state.velocity.x - 10.0 * DEFAULT_FRICTION).abs() < 1e-6);

        player.bounce(8.0);
        assert_eq!(player.state.velocity.y, -2.0);
        player.state.velocity.y = 0.0;
        player.bounce(0.5);
        assert_eq!(player.state.velocity.y, 0.0);
    }

    #[test]
    fn test_tick_lands_player_and_bounces() {
        let mut world = arena_world();
        world
            .spawn(Floor::new(floor_rect(), PeerId::server()))
            .unwrap();
        let mut player = Player::new(Rect::new(100.0, 545.0, 50.0, 50.0), PeerId::server());
        player.state.velocity.y = 8.0;
        let id = world.spawn(player).unwrap();

        let landings = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = std::rc::Rc::clone(&landings);
        world.subscribe::<Landed, _>(Subscriber::Host, move |_, _| {
            seen.set(seen.get() + 1);
            Ok(())
        });

        world.run_simulation_tick();

        let player = world.registry().get_as::<Player>(&id).unwrap();
        assert_eq!(landings.get(), 1);
        assert_eq!(player.state.rect.bottom(), 600.0);
        assert_eq!(player.state.velocity.y, -8.0 * BOUNCE);
    }

    #[test]
    fn test_remote_player_is_not_simulated() {
        let mut world = arena_world();
        let id = world
            .spawn(Player::new(Rect::new(100.0, 100.0, 50.0, 50.0), PeerId::from("client-a")))
            .unwrap();
        world.run_simulation_tick();
        world.run_simulation_tick();
        let player = world.registry().get_as::<Player>(&id).unwrap();
        assert_eq!(player.state.rect.y, 100.0);
        assert_eq!(player.state.velocity, Vec2::ZERO);
    }
}
