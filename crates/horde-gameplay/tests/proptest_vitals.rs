//! Property-based tests for monster vitals and pacing
//!
//! Validates instance invariants:
//! - Health and mana never leave `[0, max]`
//! - A dead instance always reports zero health
//! - Basic attacks against one target are spaced by at least the cooldown
//! - Identifier allocation returns the smallest free id above the floor

mod common;

use std::collections::BTreeSet;

use common::{attack_reports, Harness};
use horde_common::{Cell, CharacterId, MonsterId, SpeciesId, Timestamp};
use horde_gameplay::{
    allocate_monster_id, BehaviorConfig, CharacterSession, MonsterTemplate, StateKind,
};
use proptest::prelude::*;

fn brawler(max_hp: u32, max_mp: u32) -> MonsterTemplate {
    MonsterTemplate::new(SpeciesId::new(3), "Brawler", max_hp)
        .with_max_mp(max_mp)
        .with_speed(6)
        .with_aggressive(true)
        .with_respawn(true, 5)
        .with_basic_attack(1, 3, 0)
}

proptest! {
    /// Property: Vitals stay bounded under arbitrary damage
    ///
    /// Damage from several attackers interleaved with ticks never pushes
    /// health or mana outside their bounds, and death always means zero.
    #[test]
    fn vitals_stay_bounded(
        max_hp in 1u32..2_000,
        max_mp in 0u32..500,
        hits in prop::collection::vec((1u64..4, 0u32..800, 1u64..400), 1..60),
    ) {
        let h = Harness::new(BehaviorConfig::default());
        let mut monster = h.spawn(brawler(max_hp, max_mp), Cell::new(30, 30));
        h.character(1, Cell::new(31, 30), 1_000_000);

        let mut now = 0;
        for (attacker, amount, gap) in hits {
            now += gap;
            let before = monster.is_alive();
            let result = monster.receive_damage(
                CharacterId::new(attacker),
                amount,
                Timestamp::from_millis(now),
            );
            prop_assert_eq!(result.is_ok(), before);

            h.tick(&mut monster, now);

            prop_assert!(monster.hp() <= max_hp);
            prop_assert!(monster.mp() <= max_mp);
            if monster.state().kind() == StateKind::Dead {
                prop_assert_eq!(monster.hp(), 0);
                prop_assert_eq!(monster.target(), None);
            }
        }
    }

    /// Property: Basic attacks respect the cooldown at any tick rate
    ///
    /// However irregular the ticks, two landed attacks on the same target
    /// are never closer than the basic cooldown.
    #[test]
    fn basic_attacks_respect_cooldown(
        cooldown in 1u16..15,
        gaps in prop::collection::vec(1u64..700, 20..120),
    ) {
        let h = Harness::new(BehaviorConfig::default());
        let template = MonsterTemplate::new(SpeciesId::new(4), "Sentry", 500)
            .with_aggressive(true)
            .with_basic_attack(1, cooldown, 0);
        let mut monster = h.spawn(template, Cell::new(30, 30));
        let character = h.character(1, Cell::new(31, 31), 1_000_000);
        let spacing = u64::from(cooldown) * 200;

        let mut now = 0;
        let mut last_hit: Option<u64> = None;
        for gap in gaps {
            now += gap;
            for report in attack_reports(&h.tick(&mut monster, now)) {
                prop_assert_eq!(report.target, character.id());
                if let Some(previous) = last_hit {
                    prop_assert!(
                        now - previous >= spacing,
                        "hits at {} and {} closer than {}",
                        previous,
                        now,
                        spacing
                    );
                }
                last_hit = Some(now);
            }
        }
        prop_assert_eq!(monster.cell(), Cell::new(30, 30));
    }

    /// Property: Allocation picks the smallest free identifier
    ///
    /// For any set of live identifiers near the floor, the allocated id is
    /// not live, is at least the floor, and no smaller free id exists.
    #[test]
    fn allocation_picks_smallest_free_id(
        offsets in prop::collection::btree_set(0u32..96, 0..96),
    ) {
        let live: BTreeSet<u32> = offsets
            .iter()
            .map(|offset| MonsterId::FLOOR.raw() + offset)
            .collect();

        let id = allocate_monster_id(live.iter().copied().map(MonsterId::new))
            .expect("id space is far from exhausted");

        prop_assert!(id.raw() >= MonsterId::FLOOR.raw());
        prop_assert!(!live.contains(&id.raw()));
        for smaller in MonsterId::FLOOR.raw()..id.raw() {
            prop_assert!(live.contains(&smaller), "{} was free", smaller);
        }
    }
}
