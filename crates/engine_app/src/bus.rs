//! Synchronous, ordered event bus.
//!
//! Handlers are stored per event type in subscription order and are invoked
//! with mutable access to the [`World`]. Dispatch itself lives on
//! [`World::dispatch`] because it needs the registry for the authorisation
//! filter; the bus only stores subscriptions.
//!
//! The list for an event type is cloned (cheap `Rc` clones) before it is
//! walked, so a handler may subscribe, despawn, or dispatch further events
//! without invalidating the iteration in progress. Subscriptions added
//! during a dispatch take effect from the next dispatch of that type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use engine_component::EntityId;

use crate::error::HandlerResult;
use crate::events::Event;
use crate::world::World;

/// Who a subscription belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subscriber {
    /// The world itself or gameplay-level code. Always invoked.
    Host,
    /// An entity's behaviour. Invoked only while the entity is live and is
    /// updated by the local peer.
    Entity(EntityId),
}

type ErasedHandler = Rc<dyn Fn(&mut World, &dyn Any) -> HandlerResult>;

/// One registered handler.
#[derive(Clone)]
pub struct Subscription {
    pub(crate) owner: Subscriber,
    pub(crate) handler: ErasedHandler,
}

impl Subscription {
    #[must_use]
    pub fn owner(&self) -> &Subscriber {
        &self.owner
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Subscriptions per event type, in the order they were made.
#[derive(Debug, Default)]
pub struct EventBus {
    subscriptions: HashMap<TypeId, Vec<Subscription>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `E`. Duplicates are not detected; subscribing
    /// the same behaviour twice runs it twice.
    pub fn subscribe<E, F>(&mut self, owner: Subscriber, handler: F)
    where
        E: Event,
        F: Fn(&mut World, &E) -> HandlerResult + 'static,
    {
        let erased: ErasedHandler =
            Rc::new(move |world: &mut World, event: &dyn Any| match event.downcast_ref::<E>() {
                Some(event) => handler(world, event),
                None => Ok(()),
            });
        self.subscriptions
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Subscription {
                owner,
                handler: erased,
            });
    }

    /// Drop every subscription owned by `id`. Returns how many were removed.
    pub fn unsubscribe_entity(&mut self, id: &EntityId) -> usize {
        let mut removed = 0;
        for list in self.subscriptions.values_mut() {
            let before = list.len();
            list.retain(|sub| !matches!(&sub.owner, Subscriber::Entity(owner) if owner == id));
            removed += before - list.len();
        }
        removed
    }

    /// Handlers for `E` in subscription order.
    #[must_use]
    pub fn subscribers<E: Event>(&self) -> Vec<Subscription> {
        self.subscriptions
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscriptions
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use engine_component::{EntityError, PeerId};

    use super::*;
    use crate::config::WorldConfig;
    use crate::error::WorldError;

    struct Ping(u32);
    impl Event for Ping {}

    struct Pong;
    impl Event for Pong {}

    fn recorder() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_dispatch_runs_handlers_in_subscription_order() {
        let mut world = World::offline(WorldConfig::host());
        let log = recorder();
        for name in ["h1", "h2", "h3"] {
            let log = Rc::clone(&log);
            world.subscribe::<Ping, _>(Subscriber::Host, move |_, ping| {
                log.borrow_mut().push(format!("{name}:{}", ping.0));
                Ok(())
            });
        }

        world.dispatch(&Ping(7));
        assert_eq!(*log.borrow(), vec!["h1:7", "h2:7", "h3:7"]);
    }

    #[test]
    fn test_other_event_types_are_not_invoked() {
        let mut world = World::offline(WorldConfig::host());
        let log = recorder();
        let seen = Rc::clone(&log);
        world.subscribe::<Pong, _>(Subscriber::Host, move |_, _| {
            seen.borrow_mut().push("pong".to_string());
            Ok(())
        });

        world.dispatch(&Ping(1));
        assert!(log.borrow().is_empty());
        assert_eq!(world.bus().subscriber_count::<Pong>(), 1);
        assert_eq!(world.bus().subscriber_count::<Ping>(), 0);
    }

    #[test]
    fn test_failing_handler_does_not_stop_dispatch() {
        let mut world = World::offline(WorldConfig::host());
        let log = recorder();
        world.subscribe::<Ping, _>(Subscriber::Host, |_, _| {
            Err(WorldError::Entity(EntityError::MissingAttribute("updater")))
        });
        let seen = Rc::clone(&log);
        world.subscribe::<Ping, _>(Subscriber::Host, move |_, _| {
            seen.borrow_mut().push("after".to_string());
            Ok(())
        });

        world.dispatch(&Ping(0));
        assert_eq!(*log.borrow(), vec!["after"]);
    }

    #[test]
    fn test_nested_dispatch_and_late_subscription() {
        let mut world = World::offline(WorldConfig::host());
        let log = recorder();

        let seen = Rc::clone(&log);
        world.subscribe::<Ping, _>(Subscriber::Host, move |world, _| {
            seen.borrow_mut().push("ping".to_string());
            let late = Rc::clone(&seen);
            world.subscribe::<Ping, _>(Subscriber::Host, move |_, _| {
                late.borrow_mut().push("late".to_string());
                Ok(())
            });
            world.dispatch(&Pong);
            Ok(())
        });
        let seen = Rc::clone(&log);
        world.subscribe::<Pong, _>(Subscriber::Host, move |_, _| {
            seen.borrow_mut().push("pong".to_string());
            Ok(())
        });

        world.dispatch(&Ping(0));
        assert_eq!(*log.borrow(), vec!["ping", "pong"]);
    }

    #[test]
    fn test_unsubscribe_entity_only_removes_its_handlers() {
        let mut bus = EventBus::new();
        let id = EntityId::from("e1");
        bus.subscribe::<Ping, _>(Subscriber::Entity(id.clone()), |_, _| Ok(()));
        bus.subscribe::<Pong, _>(Subscriber::Entity(id.clone()), |_, _| Ok(()));
        bus.subscribe::<Ping, _>(Subscriber::Entity(EntityId::from("e2")), |_, _| Ok(()));
        bus.subscribe::<Ping, _>(Subscriber::Host, |_, _| Ok(()));

        assert_eq!(bus.unsubscribe_entity(&id), 2);
        assert_eq!(bus.subscriber_count::<Ping>(), 2);
        assert_eq!(bus.subscriber_count::<Pong>(), 0);
        assert_eq!(bus.unsubscribe_entity(&id), 0);
    }

    #[test]
    fn test_entity_handler_skipped_for_missing_entity() {
        let mut world = World::offline(WorldConfig::client(PeerId::from("c1")));
        let log = recorder();
        let seen = Rc::clone(&log);
        world.subscribe::<Ping, _>(Subscriber::Entity(EntityId::from("ghost")), move |_, _| {
            seen.borrow_mut().push("ghost".to_string());
            Ok(())
        });

        world.dispatch(&Ping(0));
        assert!(log.borrow().is_empty());
    }
}
