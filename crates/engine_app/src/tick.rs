//! Fixed-rate tick scheduler.
//!
//! Two independent gates are checked against wall-clock time on every loop
//! iteration:
//!
//! 1. The simulation gate (period `1 / max_tick_rate`) dispatches
//!    `TickStart`, `Tick`, and `TickComplete`.
//! 2. The network gate (period `1 / network_tick_rate`) dispatches
//!    `NetworkTick`.
//!
//! The simulation gate is always handled first. Between iterations the loop
//! sleeps until the nearer of the two deadlines.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::world::World;

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Simulation ticks per second.
    pub max_tick_rate: f64,
    /// Network flushes per second.
    pub network_tick_rate: f64,
    /// Maximum number of simulation ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            max_tick_rate: 60.0,
            network_tick_rate: 20.0,
            max_ticks: 0,
        }
    }
}

/// Which gates fired on one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gates {
    pub simulation: bool,
    pub network: bool,
}

/// A non-positive rate yields a zero period: the gate fires on every poll.
fn period(rate: f64) -> Duration {
    if rate > 0.0 && rate.is_finite() {
        Duration::from_secs_f64(1.0 / rate)
    } else {
        Duration::ZERO
    }
}

/// Drives a [`World`] at two independent rates: simulation ticks and
/// network flushes.
#[derive(Debug)]
pub struct TickScheduler {
    config: TickConfig,
    simulation_period: Duration,
    network_period: Duration,
    last_simulation: Option<Instant>,
    last_network: Option<Instant>,
    ticks: u64,
}

impl TickScheduler {
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self {
            simulation_period: period(config.max_tick_rate),
            network_period: period(config.network_tick_rate),
            config,
            last_simulation: None,
            last_network: None,
            ticks: 0,
        }
    }

    /// Simulation ticks fired so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Decide which gates fire at `now`, and record their fire time. Both
    /// gates fire on the first poll.
    pub fn poll(&mut self, now: Instant) -> Gates {
        let due = |last: Option<Instant>, period: Duration| {
            last.is_none_or(|last| now.saturating_duration_since(last) >= period)
        };
        let gates = Gates {
            simulation: due(self.last_simulation, self.simulation_period),
            network: due(self.last_network, self.network_period),
        };
        if gates.simulation {
            self.last_simulation = Some(now);
            self.ticks += 1;
        }
        if gates.network {
            self.last_network = Some(now);
        }
        gates
    }

    /// Time from `now` until the nearer gate is due.
    #[must_use]
    pub fn until_next(&self, now: Instant) -> Duration {
        let remaining = |last: Option<Instant>, period: Duration| {
            last.map_or(Duration::ZERO, |last| {
                period.saturating_sub(now.saturating_duration_since(last))
            })
        };
        remaining(self.last_simulation, self.simulation_period)
            .min(remaining(self.last_network, self.network_period))
    }

    /// Poll the gates at `now` and dispatch whatever fired.
    pub fn step(&mut self, world: &mut World, now: Instant) -> Gates {
        let gates = self.poll(now);
        if gates.simulation {
            world.run_simulation_tick();
        }
        if gates.network {
            debug!(tick_id = world.tick_id(), "network tick");
            world.run_network_tick();
        }
        gates
    }

    /// Fire the start event, then run until the world stops or `max_ticks`
    /// simulation ticks have run. Returns the number of simulation ticks.
    pub fn run(&mut self, world: &mut World) -> u64 {
        info!(
            max_tick_rate = self.config.max_tick_rate,
            network_tick_rate = self.config.network_tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );
        world.start();

        while world.is_running() {
            let start = Instant::now();
            let gates = self.step(world, start);

            if gates.simulation {
                let elapsed = start.elapsed();
                if elapsed > self.simulation_period {
                    warn!(
                        tick_id = world.tick_id(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        budget_ms = self.simulation_period.as_millis() as u64,
                        "tick exceeded time budget"
                    );
                }
                if self.config.max_ticks > 0 && self.ticks >= self.config.max_ticks {
                    break;
                }
            }

            let wait = self.until_next(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
        }

        info!(ticks = self.ticks, "tick loop stopped");
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::bus::Subscriber;
    use crate::config::WorldConfig;
    use crate::events::{NetworkTick, ServerStart, Tick, TickComplete, TickStart};

    fn config(max_tick_rate: f64, network_tick_rate: f64) -> TickConfig {
        TickConfig {
            max_tick_rate,
            network_tick_rate,
            max_ticks: 0,
        }
    }

    #[test]
    fn test_first_poll_fires_both_gates() {
        let mut scheduler = TickScheduler::new(TickConfig::default());
        let now = Instant::now();
        assert_eq!(
            scheduler.poll(now),
            Gates {
                simulation: true,
                network: true,
            }
        );
        assert_eq!(scheduler.poll(now), Gates::default());
        assert_eq!(scheduler.ticks(), 1);
    }

    #[test]
    fn test_gates_fire_independently() {
        let mut scheduler = TickScheduler::new(config(10.0, 2.0));
        let start = Instant::now();
        scheduler.poll(start);

        let mut simulation = 0;
        let mut network = 0;
        for step in 1..=10 {
            let gates = scheduler.poll(start + Duration::from_millis(100 * step));
            simulation += u32::from(gates.simulation);
            network += u32::from(gates.network);
        }
        assert_eq!(simulation, 10);
        assert_eq!(network, 2);
    }

    #[test]
    fn test_until_next_is_nearer_deadline() {
        let mut scheduler = TickScheduler::new(config(10.0, 2.0));
        let start = Instant::now();
        assert_eq!(scheduler.until_next(start), Duration::ZERO);

        scheduler.poll(start);
        assert_eq!(
            scheduler.until_next(start + Duration::from_millis(30)),
            Duration::from_millis(70)
        );
    }

    #[test]
    fn test_step_dispatches_phases_in_order() {
        let mut world = World::offline(WorldConfig::host());
        let log = Rc::new(RefCell::new(Vec::new()));
        let record = |name: &'static str| {
            let log = Rc::clone(&log);
            move || log.borrow_mut().push(name)
        };
        let network = record("network");
        world.subscribe::<NetworkTick, _>(Subscriber::Host, move |_, _| {
            network();
            Ok(())
        });
        let complete = record("complete");
        world.subscribe::<TickComplete, _>(Subscriber::Host, move |_, _| {
            complete();
            Ok(())
        });
        let tick = record("tick");
        world.subscribe::<Tick, _>(Subscriber::Host, move |_, _| {
            tick();
            Ok(())
        });
        let start = record("start");
        world.subscribe::<TickStart, _>(Subscriber::Host, move |_, _| {
            start();
            Ok(())
        });

        let mut scheduler = TickScheduler::new(TickConfig::default());
        scheduler.step(&mut world, Instant::now());
        assert_eq!(*log.borrow(), vec!["start", "tick", "complete", "network"]);
    }

    #[test]
    fn test_run_limited_ticks() {
        let mut world = World::offline(WorldConfig::host());
        let started = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&started);
        world.subscribe::<ServerStart, _>(Subscriber::Host, move |_, _| {
            *seen.borrow_mut() += 1;
            Ok(())
        });

        let mut scheduler = TickScheduler::new(TickConfig {
            max_tick_rate: 1000.0,
            network_tick_rate: 500.0,
            max_ticks: 5,
        });
        assert_eq!(scheduler.run(&mut world), 5);
        assert_eq!(world.tick_id(), 5);
        assert_eq!(*started.borrow(), 1);
    }

    #[test]
    fn test_run_stops_when_world_stops() {
        let mut world = World::offline(WorldConfig::host());
        world.subscribe::<Tick, _>(Subscriber::Host, |world, tick| {
            if tick.tick_id == 3 {
                world.stop();
            }
            Ok(())
        });

        let mut scheduler = TickScheduler::new(config(1000.0, 1000.0));
        assert_eq!(scheduler.run(&mut world), 3);
    }

    #[test]
    fn test_zero_rate_fires_every_poll() {
        let mut scheduler = TickScheduler::new(config(0.0, 0.0));
        let now = Instant::now();
        scheduler.poll(now);
        assert!(scheduler.poll(now).simulation);
        assert_eq!(scheduler.until_next(now), Duration::ZERO);
    }
}
