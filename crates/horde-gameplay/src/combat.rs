//! Monster attacks: skill rolls, cooldown gating, strikes, and splash damage.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use horde_common::{CharacterId, Timestamp};
use tracing::{debug, info, trace};

use crate::behavior::{BehaviorEngine, World};
use crate::broadcast::{AttackKind, AttackReport, MonsterMessage};
use crate::continuation::{Continuation, StrikePlan};
use crate::instance::MonsterInstance;
use crate::session::{CharacterSession, SessionHandle};
use crate::template::{MonsterTemplate, SkillTemplate};

/// Damage formula for monster hits.
pub trait DamagePolicy: Send + Sync {
    /// Damage a hit deals before invulnerability is considered.
    fn damage(
        &self,
        attacker: &MonsterTemplate,
        skill: Option<&SkillTemplate>,
        target: &dyn CharacterSession,
    ) -> u32;
}

/// Every hit deals the same amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDamage(pub u32);

impl Default for FixedDamage {
    fn default() -> Self {
        Self(100)
    }
}

impl DamagePolicy for FixedDamage {
    fn damage(
        &self,
        _attacker: &MonsterTemplate,
        _skill: Option<&SkillTemplate>,
        _target: &dyn CharacterSession,
    ) -> u32 {
        self.0
    }
}

/// Which attack a monster is about to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackChoice {
    /// The species' basic attack
    Basic,
    /// The skill at this index of the template
    Skill(usize),
}

impl fmt::Display for AttackChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic attack"),
            Self::Skill(i) => write!(f, "skill #{i}"),
        }
    }
}

impl BehaviorEngine {
    /// Rolls for a skill and updates the waiting flag.
    ///
    /// A roll happens with the configured chance, or always while the
    /// previous roll is still waiting on the basic cooldown. The pick is
    /// uniform over skills whose own cooldown has elapsed.
    pub(crate) fn roll_skill(&self, monster: &mut MonsterInstance, now: Timestamp) -> Option<usize> {
        let rolled = monster.rng.u32(0..100) < self.config.skill_roll_percent;
        if !(rolled || monster.waiting) {
            return None;
        }

        let template = Arc::clone(&monster.template);
        monster.waiting =
            now.elapsed_since(monster.last_attack) < template.basic_cooldown_duration(&self.config);

        let ready: Vec<usize> = template
            .skills
            .iter()
            .enumerate()
            .filter(|(i, skill)| {
                monster.skill_last_use(*i).map_or(true, |used| {
                    now.elapsed_since(used) >= skill.cooldown_duration(&self.config)
                })
            })
            .map(|(i, _)| i)
            .collect();

        if ready.is_empty() {
            None
        } else {
            Some(ready[monster.rng.usize(..ready.len())])
        }
    }

    /// Picks the attack that can reach the target, if any.
    ///
    /// A rolled skill is used when affordable and strictly within its range;
    /// otherwise the basic attack is used when within basic range.
    pub(crate) fn choose_attack(
        &self,
        monster: &MonsterInstance,
        skill: Option<usize>,
        distance: u32,
    ) -> Option<AttackChoice> {
        let template = &monster.template;

        if let Some(index) = skill {
            if let Some(s) = template.skills.get(index) {
                if monster.mp >= s.mp_cost && distance < u32::from(s.range) {
                    return Some(AttackChoice::Skill(index));
                }
            }
        }

        (distance <= u32::from(template.basic_range)).then_some(AttackChoice::Basic)
    }

    /// Basic cooldown elapsed and no roll waiting.
    pub(crate) fn attack_ready(&self, monster: &MonsterInstance, now: Timestamp) -> bool {
        !monster.waiting
            && now.elapsed_since(monster.last_attack)
                >= monster.template.basic_cooldown_duration(&self.config)
    }

    /// Starts an attack: pays for the skill, stands the target up, plays the
    /// cast, and lands the hit now or queues it behind the delays.
    pub(crate) fn begin_attack(
        &self,
        monster: &mut MonsterInstance,
        choice: AttackChoice,
        target: &SessionHandle,
        world: &World<'_>,
        now: Timestamp,
    ) {
        let template = Arc::clone(&monster.template);
        let skill = match choice {
            AttackChoice::Skill(index) => template.skills.get(index).map(|s| (index, s)),
            AttackChoice::Basic => None,
        };

        if let Some((index, s)) = skill {
            if let Some(slot) = monster.skill_last_use.get_mut(index) {
                *slot = Some(now);
            }
            monster.spend_mp(s.mp_cost);
            world.broadcast.notify_region(
                monster.map,
                MonsterMessage::Cast {
                    monster: monster.id,
                    target: target.id(),
                    cast_animation: s.cast_animation,
                    cast_effect: s.cast_effect,
                    skill: s.skill,
                },
            );
        }
        debug!("{} uses {choice} on {}", monster.id, target.id());

        monster.last_move = now;
        monster.path.clear();

        let mut delay = Duration::ZERO;
        if target.is_seated() {
            target.stand_up();
            world.broadcast.notify_region(
                monster.map,
                MonsterMessage::StandUp {
                    character: target.id(),
                },
            );
            delay += self.config.stand_up_delay();
        }
        if let Some((_, s)) = skill {
            if s.cast_effect != 0 {
                world
                    .broadcast
                    .notify_region(monster.map, monster.effect(s.cast_effect));
                delay += s.cast_duration(&self.config);
            }
        }

        let plan = StrikePlan {
            target: target.id(),
            skill: skill.map(|(index, _)| index),
        };
        if delay.is_zero() {
            self.land_strike(monster, plan, world, now);
        } else {
            monster.schedule(now.after(delay), Continuation::Strike(plan));
        }
    }

    /// Lands a planned hit, re-resolving the target first.
    pub(crate) fn land_strike(
        &self,
        monster: &mut MonsterInstance,
        plan: StrikePlan,
        world: &World<'_>,
        now: Timestamp,
    ) {
        if !monster.is_alive() || monster.target() != Some(plan.target) {
            trace!("{} strike on {} dropped: no longer targeted", monster.id, plan.target);
            return;
        }
        let Some(target) = world.sessions.resolve_character_session(plan.target) else {
            trace!("{} strike on {} dropped: gone", monster.id, plan.target);
            return;
        };
        if target.map() != monster.map || target.hp() == 0 || target.is_invisible() {
            trace!("{} strike on {} dropped: unreachable", monster.id, plan.target);
            return;
        }

        let template = Arc::clone(&monster.template);
        let skill = plan.skill.and_then(|index| template.skills.get(index));

        let damage = self.damage_against(&template, skill, target.as_ref());
        let remaining = target.apply_damage(damage);
        world.broadcast.notify_one(
            target.id(),
            MonsterMessage::StatRefresh {
                character: target.id(),
            },
        );

        let kind = match skill {
            Some(s) => AttackKind::Skill {
                skill: s.skill,
                cooldown: s.cooldown,
                attack_animation: s.attack_animation,
                effect: s.effect,
                origin: monster.cell,
            },
            None => basic_kind(&template),
        };
        world.broadcast.notify_region(
            monster.map,
            MonsterMessage::AttackResult(AttackReport {
                monster: monster.id,
                target: target.id(),
                kind,
                target_alive: remaining > 0,
                hp_percent: target.health_percent(),
                damage,
            }),
        );
        debug!("{} hit {} for {damage}", monster.id, target.id());

        monster.last_attack = now;
        if remaining == 0 {
            self.character_killed(monster, target.id(), now);
        }

        if let Some(s) = skill.filter(|s| s.has_area()) {
            self.splash(monster, s, target.as_ref(), world, now);
        }
    }

    /// Hits every other living character around the impact point.
    fn splash(
        &self,
        monster: &mut MonsterInstance,
        skill: &SkillTemplate,
        primary: &dyn CharacterSession,
        world: &World<'_>,
        now: Timestamp,
    ) {
        let template = Arc::clone(&monster.template);
        let center = if skill.target_range == 0 {
            monster.cell
        } else {
            primary.cell()
        };
        let radius = u32::from(skill.target_range) + u32::from(skill.range);

        for other in world
            .sessions
            .list_characters_in_radius(monster.map, center, radius)
        {
            if other.id() == primary.id() || other.hp() == 0 {
                continue;
            }

            // No stand-up delay for splash victims; they are hit right away
            if other.is_seated() {
                other.stand_up();
                world.broadcast.notify_region(
                    monster.map,
                    MonsterMessage::StandUp {
                        character: other.id(),
                    },
                );
            }

            let damage = self.damage_against(&template, Some(skill), other.as_ref());
            let remaining = other.apply_damage(damage);
            world.broadcast.notify_one(
                other.id(),
                MonsterMessage::StatRefresh {
                    character: other.id(),
                },
            );
            world.broadcast.notify_region(
                monster.map,
                MonsterMessage::AttackResult(AttackReport {
                    monster: monster.id,
                    target: other.id(),
                    kind: basic_kind(&template),
                    target_alive: remaining > 0,
                    hp_percent: other.health_percent(),
                    damage,
                }),
            );

            if remaining == 0 {
                self.character_killed(monster, other.id(), now);
            }
        }
    }

    fn character_killed(&self, monster: &mut MonsterInstance, character: CharacterId, now: Timestamp) {
        info!("{} killed {}", monster.id, character);
        monster.schedule(
            now.after(self.config.revival_prompt_delay()),
            Continuation::PromptRevival { character },
        );
        if monster.target() == Some(character) {
            monster.clear_target();
        }
    }

    fn damage_against(
        &self,
        template: &MonsterTemplate,
        skill: Option<&SkillTemplate>,
        target: &dyn CharacterSession,
    ) -> u32 {
        if target.has_invulnerability() {
            0
        } else {
            self.damage.damage(template, skill, target)
        }
    }
}

fn basic_kind(template: &MonsterTemplate) -> AttackKind {
    AttackKind::Basic {
        cooldown: template.basic_cooldown,
        effect: template.basic_skill,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BehaviorConfig;
    use crate::instance::StateKind;
    use crate::session::PlayerCharacter;
    use crate::testing::Fixture;
    use horde_common::{Cell, MapId, SkillId, SpeciesId};

    fn brute() -> MonsterTemplate {
        MonsterTemplate::new(SpeciesId::new(2), "Brute", 400)
            .with_max_mp(50)
            .with_speed(10)
            .with_aggressive(true)
            .with_basic_attack(2, 5, 300)
    }

    fn reports(fx: &Fixture) -> Vec<AttackReport> {
        fx.outbox
            .drain()
            .into_iter()
            .filter_map(|e| match e.message {
                MonsterMessage::AttackResult(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_basic_attack_and_cooldown() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(brute(), Cell::new(10, 10));
        let character = fx.add_character(1, Cell::new(11, 10));

        // Acquire
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        assert_eq!(monster.target(), Some(character.id()));
        fx.outbox.drain();

        // Cooldown 5 * 200 ms counted from spawn
        let state = fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(999));
        assert_eq!(state, StateKind::Engaging);
        assert!(reports(&fx).is_empty());

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        let hits = reports(&fx);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].damage, 100);
        assert_eq!(hits[0].hp_percent, 90);
        assert!(hits[0].target_alive);
        assert!(matches!(hits[0].kind, AttackKind::Basic { cooldown: 5, effect: 300 }));
        assert_eq!(character.hp(), 900);

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_999));
        assert!(reports(&fx).is_empty());
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(2_000));
        assert_eq!(reports(&fx).len(), 1);
    }

    #[test]
    fn test_seated_target_delays_hit() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(brute(), Cell::new(10, 10));
        let character = fx.add_character(1, Cell::new(11, 10));
        character.set_seated(true);

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        assert!(!character.is_seated());
        assert!(monster.is_busy());
        assert_eq!(character.hp(), 1000);

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_499));
        assert_eq!(character.hp(), 1000);
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_500));
        assert_eq!(character.hp(), 900);
        assert!(!monster.is_busy());
        assert_eq!(monster.last_attack(), Timestamp::from_millis(1_500));
    }

    #[test]
    fn test_skill_cast_with_area() {
        let config = BehaviorConfig {
            skill_roll_percent: 100,
            ..BehaviorConfig::default()
        };
        let fx = Fixture::with_config(config);
        let template = brute().with_skill(
            SkillTemplate::new(SkillId::new(77))
                .with_cooldown(50)
                .with_range(3, 2)
                .with_mp_cost(20),
        );
        let mut monster = fx.spawn(template, Cell::new(10, 10));
        let primary = fx.add_character(1, Cell::new(12, 10));
        let bystander = fx.add_character(2, Cell::new(13, 11));
        let far = fx.add_character(3, Cell::new(30, 30));

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        assert_eq!(monster.target(), Some(primary.id()));
        fx.outbox.drain();

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        assert_eq!(monster.mp(), 30);
        assert_eq!(monster.skill_last_use(0), Some(Timestamp::from_millis(1_000)));

        let hits = reports(&fx);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].target, primary.id());
        assert!(matches!(hits[0].kind, AttackKind::Skill { skill, .. } if skill == SkillId::new(77)));
        assert_eq!(hits[1].target, bystander.id());
        assert!(matches!(hits[1].kind, AttackKind::Basic { .. }));
        assert_eq!(primary.hp(), 900);
        assert_eq!(bystander.hp(), 900);
        assert_eq!(far.hp(), 1000);
    }

    #[test]
    fn test_unaffordable_skill_falls_back_to_basic() {
        let config = BehaviorConfig {
            skill_roll_percent: 100,
            ..BehaviorConfig::default()
        };
        let fx = Fixture::with_config(config);
        let template = brute().with_skill(
            SkillTemplate::new(SkillId::new(5))
                .with_range(5, 0)
                .with_mp_cost(50),
        );
        let mut monster = fx.spawn(template, Cell::new(10, 10));
        monster.mp = 10;
        let character = fx.add_character(1, Cell::new(11, 10));

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        fx.outbox.drain();
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));

        let hits = reports(&fx);
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0].kind, AttackKind::Basic { .. }));
        assert_eq!(monster.mp(), 10);
        assert_eq!(character.hp(), 900);
    }

    #[test]
    fn test_cast_effect_defers_strike() {
        let config = BehaviorConfig {
            skill_roll_percent: 100,
            ..BehaviorConfig::default()
        };
        let fx = Fixture::with_config(config);
        let template = brute().with_skill(
            SkillTemplate::new(SkillId::new(8))
                .with_cast(4242, 7)
                .with_range(4, 0),
        );
        let mut monster = fx.spawn(template, Cell::new(10, 10));
        let character = fx.add_character(1, Cell::new(12, 10));

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        assert!(monster.is_busy());
        assert_eq!(character.hp(), 1000);

        let messages: Vec<_> = fx.outbox.drain().into_iter().map(|e| e.message).collect();
        assert!(messages.contains(&monster.effect(4242)));

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_700));
        assert_eq!(character.hp(), 900);
    }

    #[test]
    fn test_kill_prompts_revival_and_clears_target() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(brute(), Cell::new(10, 10));
        let character = fx.add_character(1, Cell::new(11, 10));
        character.set_hp(50);

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        let state = fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        assert_eq!(state, StateKind::Idle);
        assert_eq!(character.hp(), 0);

        let hits = reports(&fx);
        assert!(!hits[0].target_alive);
        assert_eq!(hits[0].hp_percent, 0);

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_999));
        assert!(fx.directory.revival_prompts().is_empty());
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(2_000));
        assert_eq!(fx.directory.revival_prompts(), vec![character.id()]);
    }

    #[test]
    fn test_invulnerable_takes_no_damage() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(brute(), Cell::new(10, 10));
        let character = fx.directory.insert(
            PlayerCharacter::new(CharacterId::new(1), MapId::new(1), Cell::new(11, 10), 1000)
                .with_invulnerability(true),
        );

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        assert_eq!(character.hp(), 1000);
        assert_eq!(reports(&fx)[0].damage, 0);
    }

    #[test]
    fn test_custom_damage_policy() {
        #[derive(Debug)]
        struct Halving;
        impl DamagePolicy for Halving {
            fn damage(
                &self,
                _attacker: &MonsterTemplate,
                _skill: Option<&SkillTemplate>,
                target: &dyn CharacterSession,
            ) -> u32 {
                target.hp() / 2
            }
        }

        let fx = Fixture::with_engine(BehaviorEngine::default().with_damage_policy(Arc::new(Halving)));
        let mut monster = fx.spawn(brute(), Cell::new(10, 10));
        let character = fx.add_character(1, Cell::new(11, 10));

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        assert_eq!(character.hp(), 500);
    }

    #[test]
    fn test_strike_abandoned_when_target_turns_invisible() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(brute(), Cell::new(10, 10));
        let character = fx.add_character(1, Cell::new(11, 10));
        character.set_seated(true);

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        assert!(monster.is_busy());

        character.set_invisible(true);
        let state = fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_100));
        assert_eq!(state, StateKind::Idle);
        assert!(!monster.is_busy());

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_500));
        assert_eq!(character.hp(), 1000);
        assert!(reports(&fx).is_empty());
    }

    #[test]
    fn test_due_strike_skips_invisible_target() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(brute(), Cell::new(10, 10));
        let character = fx.add_character(1, Cell::new(11, 10));
        character.set_seated(true);

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        character.set_invisible(true);

        // Settling alone, with no evaluation in between
        fx.engine.settle(&mut monster, &fx.world(), Timestamp::from_millis(1_500));
        assert_eq!(character.hp(), 1000);
        assert!(!monster.is_busy());
        assert!(reports(&fx).is_empty());
    }

    #[test]
    fn test_strike_abandoned_when_target_leaves() {
        let fx = Fixture::new();
        let mut monster = fx.spawn(brute(), Cell::new(10, 10));
        let character = fx.add_character(1, Cell::new(11, 10));
        character.set_seated(true);

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(100));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_000));
        fx.directory.remove(character.id());

        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_100));
        assert!(!monster.is_busy());
        assert_eq!(monster.target(), None);

        fx.directory.insert(PlayerCharacter::new(
            character.id(),
            MapId::new(1),
            Cell::new(40, 40),
            1000,
        ));
        fx.engine.tick(&mut monster, &fx.world(), Timestamp::from_millis(1_500));
        assert!(reports(&fx).is_empty());
    }
}
