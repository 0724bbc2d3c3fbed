//! Monster movement: idle wandering, pursuit, and returning home.
//!
//! Movement is announced up front and committed later: every step broadcasts
//! a move to observers and queues a relocation for when travel is over.

use std::sync::Arc;
use std::time::Duration;

use horde_common::{Cell, Timestamp};
use tracing::{debug, trace};

use crate::behavior::{BehaviorEngine, World};
use crate::broadcast::MonsterMessage;
use crate::continuation::Continuation;
use crate::instance::MonsterInstance;
use crate::session::CharacterSession;

/// Time to walk one queued waypoint while idle.
fn waypoint_duration(speed: u8) -> Duration {
    Duration::from_millis(1000 / (2 * u64::from(speed.max(1))))
}

impl BehaviorEngine {
    /// Walks one queued waypoint, or wanders once the idle delay is over.
    pub(crate) fn idle_step(&self, monster: &mut MonsterInstance, world: &World<'_>, now: Timestamp) {
        if !monster.can_move() {
            return;
        }

        let speed = monster.template.speed;
        let since = now.elapsed_since(monster.last_move);

        if let Some(&next) = monster.path.front() {
            let step = waypoint_duration(speed);
            if since > step {
                monster.path.pop_front();
                monster.last_move = now;
                self.announce_move(monster, next, step, world, now);
            }
            return;
        }

        if since <= monster.idle_move_delay {
            return;
        }

        let config = &self.config;
        monster.idle_move_delay = Duration::from_millis(
            monster
                .rng
                .u64(config.idle_move_min_ms..config.idle_move_max_ms),
        );

        // Split a small spread between the axes, favouring neither
        let spread = monster
            .rng
            .u8(config.wander_spread_min..config.wander_spread_max);
        let first = monster.rng.u8(0..2).min(spread - 1);
        let x_spread = monster.rng.u8(first..spread);
        let y_spread = spread - x_spread;

        let Some(cell) = world
            .spatial
            .find_free_cell(monster.anchor, x_spread, y_spread)
        else {
            trace!("{} found no free cell to wander to", monster.id);
            return;
        };

        let travel = Duration::from_millis(
            1000 * u64::from(x_spread + y_spread) / (2 * u64::from(speed)),
        );
        monster.last_move = now.after(travel);
        self.announce_move(monster, cell, travel, world, now);
    }

    /// Advances pursuit of `target`, or gives up and heads home.
    ///
    /// `distance` is measured from the current cell to the target.
    pub(crate) fn chase_step(
        &self,
        monster: &mut MonsterInstance,
        target: &dyn CharacterSession,
        distance: u32,
        world: &World<'_>,
        now: Timestamp,
    ) {
        let template = Arc::clone(&monster.template);
        let can_move = monster.can_move();
        let same_map = target.map() == monster.map;
        let chase = self.config.chase_distance;

        if can_move && monster.path.is_empty() && same_map && distance > 1 && distance < chase {
            let jitter_x = monster.rng.i16(-1..1);
            let jitter_y = monster.rng.i16(-1..1);
            let destination = target.cell().offset(jitter_x, jitter_y);

            let route = world.spatial.route(monster.planned_cell(), destination);
            if route.is_empty() {
                trace!("{} has no route to {:?}", monster.id, destination);
            }
            monster.path.extend(route);
        }

        if can_move && now > monster.last_move && !monster.path.is_empty() {
            let speed = template.speed;
            let chunk = (usize::from(speed) / 2).max(1).min(monster.path.len());
            let destination = monster.path[chunk - 1];

            let cells = u64::from(world.spatial.distance(destination, monster.cell));
            let travel = Duration::from_millis(
                (cells * 1000 / u64::from(speed)).min(self.config.max_chase_step_ms),
            );

            monster.last_move = now.after(travel);
            monster.path.drain(..chunk);
            self.announce_move(monster, destination, travel, world, now);
        }

        if monster.path.is_empty() && (!same_map || distance > chase) {
            debug!("{} gave up on {}", monster.id, target.id());
            if can_move {
                let route = world.spatial.route(monster.planned_cell(), monster.anchor);
                monster.path.extend(route);
            }
            monster.clear_target();
        }
    }

    fn announce_move(
        &self,
        monster: &mut MonsterInstance,
        to: Cell,
        travel: Duration,
        world: &World<'_>,
        now: Timestamp,
    ) {
        world.broadcast.notify_region(
            monster.map,
            MonsterMessage::Move {
                monster: monster.id,
                to,
                speed: monster.template.speed,
                duration_ms: u64::try_from(travel.as_millis()).unwrap_or(u64::MAX),
            },
        );
        monster.schedule(now.after(travel), Continuation::Relocate { to });
    }
}
