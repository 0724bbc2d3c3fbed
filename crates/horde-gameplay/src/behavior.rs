//! The per-tick monster state machine.
//!
//! Each call to [`BehaviorEngine::tick`] first settles the instance's due
//! continuations, then evaluates exactly one of:
//! - **Dead**: respawn once the species' respawn delay has elapsed
//! - **Idle**: walk queued waypoints or wander near the anchor, then look for
//!   a character to attack if the species is aggressive
//! - **Pursuing / Engaging**: re-validate the target, attack if it is in reach
//!   and the cooldowns allow, otherwise chase it or give up and head home
//!
//! Movement lives in [`crate::movement`], attacks in [`crate::combat`].

use std::fmt;
use std::sync::Arc;

use horde_common::{CharacterId, Timestamp};
use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::combat::{DamagePolicy, FixedDamage};
use crate::config::BehaviorConfig;
use crate::continuation::Continuation;
use crate::instance::{BehaviorState, MonsterInstance, StateKind};
use crate::session::{CharacterSession, SessionDirectory};
use crate::spatial::SpatialProvider;

/// The collaborators a tick talks to.
#[derive(Clone, Copy)]
pub struct World<'a> {
    /// Distances and routes
    pub spatial: &'a dyn SpatialProvider,
    /// Character lookup
    pub sessions: &'a dyn SessionDirectory,
    /// Outgoing notifications
    pub broadcast: &'a dyn Broadcaster,
}

impl<'a> World<'a> {
    /// Bundles the collaborators.
    #[must_use]
    pub fn new(
        spatial: &'a dyn SpatialProvider,
        sessions: &'a dyn SessionDirectory,
        broadcast: &'a dyn Broadcaster,
    ) -> Self {
        Self {
            spatial,
            sessions,
            broadcast,
        }
    }
}

/// Stateless evaluator of monster behavior.
///
/// All per-monster state lives on the [`MonsterInstance`]; the engine can be
/// shared by any number of worker threads.
pub struct BehaviorEngine {
    pub(crate) config: BehaviorConfig,
    pub(crate) damage: Arc<dyn DamagePolicy>,
}

impl fmt::Debug for BehaviorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for BehaviorEngine {
    fn default() -> Self {
        Self::new(BehaviorConfig::default())
    }
}

impl BehaviorEngine {
    /// Creates an engine with the fixed placeholder damage.
    #[must_use]
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            config: config.validated(),
            damage: Arc::new(FixedDamage::default()),
        }
    }

    /// Replaces the damage formula.
    #[must_use]
    pub fn with_damage_policy(mut self, policy: Arc<dyn DamagePolicy>) -> Self {
        self.damage = policy;
        self
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Runs one behavior evaluation and reports the resulting state.
    pub fn tick(&self, monster: &mut MonsterInstance, world: &World<'_>, now: Timestamp) -> StateKind {
        self.settle(monster, world, now);

        match monster.state {
            BehaviorState::Dead { since } => self.tick_dead(monster, since, world, now),
            BehaviorState::Idle => {
                self.idle_step(monster, world, now);
                self.acquire_target(monster, world);
            },
            BehaviorState::Pursuing(target) | BehaviorState::Engaging(target) => {
                self.tick_hunting(monster, target, world, now);
            },
        }

        monster.state.kind()
    }

    /// Applies every continuation due at `now`, earliest first.
    pub fn settle(&self, monster: &mut MonsterInstance, world: &World<'_>, now: Timestamp) {
        for action in monster.pending.take_due(now) {
            match action {
                Continuation::Relocate { to } => monster.cell = to,
                Continuation::Strike(plan) => self.land_strike(monster, plan, world, now),
                Continuation::PromptRevival { character } => {
                    world.sessions.trigger_revival_prompt(character);
                },
            }
        }
    }

    fn tick_dead(
        &self,
        monster: &mut MonsterInstance,
        since: Timestamp,
        world: &World<'_>,
        now: Timestamp,
    ) {
        if !monster.respawns {
            return;
        }
        if now.elapsed_since(since) < monster.template.respawn_delay(&self.config) {
            return;
        }

        monster.respawn(now);
        info!("{} respawned at {:?}", monster.id, monster.cell);

        if let Some(snapshot) = monster.snapshot() {
            world.broadcast.notify_region(monster.map, snapshot);
        }
        world
            .broadcast
            .notify_region(monster.map, monster.effect(self.config.respawn_effect));
    }

    /// Targets the first eligible character in aggro range.
    fn acquire_target(&self, monster: &mut MonsterInstance, world: &World<'_>) {
        if !monster.template.aggressive {
            return;
        }

        let map = monster.map;
        let origin = monster.cell;
        let radius = self.config.aggro_radius;
        let spatial = world.spatial;
        let eligible = |c: &dyn CharacterSession| {
            c.hp() > 0
                && !c.is_invisible()
                && !c.is_invisible_gm()
                && c.map() == map
                && spatial.distance(origin, c.cell()) < radius
        };

        let Some(found) = world
            .sessions
            .find_nearest_hostile(map, origin, radius, &eligible)
        else {
            return;
        };

        debug!("{} aggroed on {}", monster.id, found.id());
        monster.set_target(found.id());
        if !monster.template.hide_aggro_icon {
            world
                .broadcast
                .notify_one(found.id(), monster.effect(self.config.aggro_effect));
        }
    }

    fn tick_hunting(
        &self,
        monster: &mut MonsterInstance,
        target_id: CharacterId,
        world: &World<'_>,
        now: Timestamp,
    ) {
        let target = world
            .sessions
            .resolve_character_session(target_id)
            .filter(|t| t.hp() > 0 && !t.is_invisible());
        let Some(target) = target else {
            debug!("{} lost track of {}", monster.id, target_id);
            monster.clear_target();
            return;
        };

        if monster.is_busy() {
            monster.state = BehaviorState::Engaging(target_id);
            return;
        }

        let skill = self.roll_skill(monster, now);
        let distance = world.spatial.distance(monster.cell, target.cell());
        let choice = if target.map() == monster.map {
            self.choose_attack(monster, skill, distance)
        } else {
            None
        };

        if let Some(choice) = choice {
            monster.state = BehaviorState::Engaging(target_id);
            if self.attack_ready(monster, now) {
                self.begin_attack(monster, choice, &target, world, now);
            }
        } else {
            monster.state = BehaviorState::Pursuing(target_id);
            self.chase_step(monster, target.as_ref(), distance, world, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::MonsterMessage;
    use crate::template::MonsterTemplate;
    use crate::testing::Fixture;
    use horde_common::{Cell, SpeciesId};

    fn wolf() -> MonsterTemplate {
        MonsterTemplate::new(SpeciesId::new(1), "Wolf", 200)
            .with_speed(10)
            .with_aggressive(true)
            .with_respawn(true, 50)
            .with_basic_attack(1, 4, 100)
    }

    #[test]
    fn test_aggro_within_radius() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(wolf(), Cell::new(20, 20));
        let character = fx.add_character(1, Cell::new(25, 20));

        let state = fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(10));
        assert_eq!(state, StateKind::Pursuing);
        assert_eq!(monster.target(), Some(character.id()));

        let aggro_cue = fx.outbox.drain().into_iter().any(|e| {
            e.message == MonsterMessage::Effect {
                monster: monster.id(),
                effect: 5000,
            }
        });
        assert!(aggro_cue);
    }

    #[test]
    fn test_no_aggro_at_radius() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(wolf(), Cell::new(20, 20));
        fx.add_character(1, Cell::new(30, 20));

        let state = fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(10));
        assert_eq!(state, StateKind::Idle);
    }

    #[test]
    fn test_hidden_aggro_icon() {
        let fx = Fixture::new();
        let mut template = wolf();
        template.hide_aggro_icon = true;
        let mut monster = fx.spawn(template, Cell::new(20, 20));
        fx.add_character(1, Cell::new(21, 20));

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(10));
        assert!(monster.target().is_some());
        assert!(!fx
            .outbox
            .drain()
            .iter()
            .any(|e| matches!(e.message, MonsterMessage::Effect { effect: 5000, .. })));
    }

    #[test]
    fn test_target_removed_goes_idle() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(wolf(), Cell::new(20, 20));
        let character = fx.add_character(1, Cell::new(25, 20));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(10));
        assert!(monster.target().is_some());

        fx.directory.remove(character.id());
        let state = fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(20));
        assert_eq!(state, StateKind::Idle);
    }

    #[test]
    fn test_respawn_after_delay() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(wolf(), Cell::new(20, 20));
        monster
            .receive_damage(CharacterId::new(9), 500, Timestamp::from_millis(1_000))
            .expect("monster should be alive");

        let state = fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(5_999));
        assert_eq!(state, StateKind::Dead);

        let state = fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(6_000));
        assert_eq!(state, StateKind::Idle);
        assert_eq!(monster.hp(), 200);

        let messages: Vec<_> = fx.outbox.drain().into_iter().map(|e| e.message).collect();
        assert!(matches!(messages[0], MonsterMessage::Snapshot { hp_percent: 100, .. }));
        assert_eq!(messages[1], monster.effect(7));
    }

    #[test]
    fn test_engine_debug() {
        let engine = BehaviorEngine::default();
        assert!(format!("{engine:?}").contains("BehaviorEngine"));
    }
}
