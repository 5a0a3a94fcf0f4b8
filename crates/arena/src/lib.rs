//! # arena
//!
//! A small platform arena built on the replicated world. The host owns the
//! floor; every client spawns its own player and the shotgun it carries.
//! Players and weapons reach the other clients through the host's relay.

pub mod events;
pub mod floor;
pub mod player;
pub mod weapon;

use engine_app::events::{ClientStart, ServerStart};
use engine_app::{HandlerResult, Subscriber, World};
use engine_component::{Entity, EntityRef};
use engine_math::Rect;
use tracing::info;

pub use events::Landed;
pub use floor::Floor;
pub use player::Player;
pub use weapon::Weapon;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "arena=info,engine_app=info,engine_net=info";

/// The host's single floor.
pub const FLOOR_RECT: Rect = Rect::new(0.0, 600.0, 1920.0, 20.0);

/// Where a client's player appears.
pub const PLAYER_SPAWN: Rect = Rect::new(100.0, 100.0, 50.0, 50.0);

/// Add the arena's entity types to the type map.
pub fn register_types(world: &mut World) {
    world.register_type::<Floor>("floor");
    world.register_type::<Player>("player");
    world.register_type::<Weapon>("shotgun");
}

/// Register the arena's types and its start-up handlers.
pub fn install(world: &mut World) {
    register_types(world);
    world.subscribe::<ServerStart, _>(Subscriber::Host, |world, _| spawn_floor(world));
    world.subscribe::<ClientStart, _>(Subscriber::Host, |world, _| spawn_player(world));
}

/// Spawn the host-owned floor.
///
/// # Errors
///
/// Fails if the floor type is not registered.
pub fn spawn_floor(world: &mut World) -> HandlerResult {
    let floor = Floor::new(FLOOR_RECT, world.identity().clone());
    let id = world.spawn(floor)?;
    info!(entity_id = %id, "floor spawned");
    Ok(())
}

/// Spawn this peer's player holding a shotgun.
///
/// # Errors
///
/// Fails if the player or shotgun type is not registered.
pub fn spawn_player(world: &mut World) -> HandlerResult {
    let identity = world.identity().clone();
    let mut player = Player::new(PLAYER_SPAWN, identity.clone());
    let shotgun = Weapon::shotgun(EntityRef::resolved(player.id().clone()), identity);
    player.state.weapon = Some(EntityRef::resolved(shotgun.id().clone()));

    let player_id = world.spawn(player)?;
    let shotgun_id = world.spawn(shotgun)?;
    info!(player = %player_id, shotgun = %shotgun_id, "player spawned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use engine_app::WorldConfig;
    use engine_component::{AttrMap, EntityCore, EntityId, PeerId, Replicated};
    use engine_net::{Inbound, ReplicationUpdate};

    use super::*;

    fn world(config: WorldConfig) -> World {
        let mut world = World::offline(config);
        install(&mut world);
        world
    }

    fn round_trip(world: &mut World, type_name: &str, entity: &dyn Entity) -> (AttrMap, AttrMap) {
        let before = entity.serialize().unwrap();
        let id = EntityId::from(format!("copy-of-{}", entity.id()));
        world
            .registry_mut()
            .create_from_wire(type_name, id.clone(), before.clone())
            .unwrap();
        let after = world.registry().get(&id).unwrap().serialize().unwrap();
        (before, after)
    }

    #[test]
    fn test_every_arena_type_round_trips() {
        let mut world = world(WorldConfig::host());
        let floor = Floor::new(FLOOR_RECT, PeerId::server());

        let mut player = Player::new(PLAYER_SPAWN, PeerId::from("a"));
        player.state.velocity.x = 3.5;
        player.state.health = 70;
        player.state.weapon = Some(EntityRef::resolved(EntityId::from("w1")));

        let weapon = Weapon::shotgun(EntityRef::resolved(EntityId::from("p1")), PeerId::from("a"));

        for (name, entity) in [
            ("floor", &floor as &dyn Entity),
            ("player", &player),
            ("shotgun", &weapon),
        ] {
            let (before, after) = round_trip(&mut world, name, entity);
            assert_eq!(before, after, "{name} changed across the wire");
        }
    }

    #[test]
    fn test_type_names_follow_type_map() {
        let world = world(WorldConfig::host());
        let floor = Floor::with_core(EntityCore::new(EntityId::from("f1"), PeerId::server()), FLOOR_RECT);
        assert_eq!(world.registry().lookup_type_name(&floor).unwrap(), "floor");
        let names: Vec<&str> = world.registry().types().names().collect();
        assert_eq!(names, vec!["floor", "player", "shotgun"]);
    }

    #[test]
    fn test_client_start_spawns_linked_player_and_shotgun() {
        let mut world = world(WorldConfig::client("a"));
        world.start();

        let players: Vec<&Player> = world
            .registry()
            .iter()
            .filter_map(|entity| entity.as_any().downcast_ref::<Player>())
            .collect();
        assert_eq!(players.len(), 1);
        let weapon_ref = players[0].state.weapon.clone().unwrap();
        let weapon = world.registry().get_as::<Weapon>(weapon_ref.id()).unwrap();
        assert_eq!(weapon.state.owner.id(), players[0].id());
        assert_eq!(world.registry().owned_by(&PeerId::from("a")).len(), 2);
    }

    #[test]
    fn test_server_start_spawns_floor() {
        let mut world = world(WorldConfig::host());
        world.start();
        assert_eq!(world.registry().len(), 1);
        let floor = world.registry().iter().next().unwrap();
        assert_eq!(floor.as_any().downcast_ref::<Floor>().unwrap().state.rect, FLOOR_RECT);
    }

    fn create(entity: &dyn Entity, type_name: &str) -> ReplicationUpdate {
        ReplicationUpdate::create(entity.id().clone(), type_name, entity.serialize().unwrap())
    }

    fn client_entities() -> (ReplicationUpdate, ReplicationUpdate) {
        let owner = PeerId::from("a");
        let mut player = Player::with_core(EntityCore::new(EntityId::from("p1"), owner.clone()), PLAYER_SPAWN);
        let mut weapon = Weapon::shotgun(EntityRef::resolved(EntityId::from("p1")), owner);
        weapon.core_mut().id = EntityId::from("w1");
        player.state.weapon = Some(EntityRef::resolved(EntityId::from("w1")));
        (create(&player, "player"), create(&weapon, "shotgun"))
    }

    #[test]
    fn test_forward_reference_in_one_batch_resolves() {
        let mut world = world(WorldConfig::host());
        let (player, weapon) = client_entities();
        world.enqueue_inbound(Inbound {
            from: PeerId::from("a"),
            updates: vec![weapon, player],
        });
        world.load_updates();

        let weapon = world.registry().get_as::<Weapon>(&EntityId::from("w1")).unwrap();
        let player = world.registry().get_as::<Player>(&EntityId::from("p1")).unwrap();
        assert!(weapon.state.owner.is_resolved());
        assert!(player.state.weapon.as_ref().is_some_and(EntityRef::is_resolved));
    }

    #[test]
    fn test_forward_reference_across_batches_resolves() {
        let mut world = world(WorldConfig::host());
        let (player, weapon) = client_entities();

        world.enqueue_inbound(Inbound {
            from: PeerId::from("a"),
            updates: vec![weapon],
        });
        world.load_updates();
        let pending = world.registry().get_as::<Weapon>(&EntityId::from("w1")).unwrap();
        assert!(!pending.state.owner.is_resolved());

        world.enqueue_inbound(Inbound {
            from: PeerId::from("a"),
            updates: vec![player],
        });
        world.load_updates();
        let weapon = world.registry().get_as::<Weapon>(&EntityId::from("w1")).unwrap();
        assert!(weapon.state.owner.is_resolved());
    }
}
