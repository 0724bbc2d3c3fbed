//! Monster identifier allocation.

use std::collections::BTreeSet;

use horde_common::MonsterId;

use crate::instance::{MonsterError, MonsterResult};

/// Returns the smallest identifier in the monster range not present in `live`.
///
/// Callers must hold whatever lock guards the live set until the new
/// identifier has been inserted, or two allocations can race to the same id.
pub fn allocate_monster_id<I>(live: I) -> MonsterResult<MonsterId>
where
    I: IntoIterator<Item = MonsterId>,
{
    allocate_in(live, MonsterId::FLOOR.raw(), MonsterId::CEILING.raw())
}

/// Returns the smallest identifier in `[floor, ceiling)` not present in `live`.
pub fn allocate_in<I>(live: I, floor: u32, ceiling: u32) -> MonsterResult<MonsterId>
where
    I: IntoIterator<Item = MonsterId>,
{
    let taken: BTreeSet<u32> = live
        .into_iter()
        .map(MonsterId::raw)
        .filter(|raw| (floor..ceiling).contains(raw))
        .collect();

    let mut candidate = floor;
    for raw in taken {
        if raw != candidate {
            break;
        }
        candidate += 1;
    }

    if candidate >= ceiling {
        return Err(MonsterError::IdSpaceExhausted { floor, ceiling });
    }
    Ok(MonsterId::new(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<MonsterId> {
        raw.iter().copied().map(MonsterId::new).collect()
    }

    #[test]
    fn test_empty_gets_floor() {
        let id = allocate_monster_id(Vec::new()).expect("id should be free");
        assert_eq!(id, MonsterId::FLOOR);
    }

    #[test]
    fn test_fills_first_gap() {
        let live = ids(&[20_000, 20_001, 20_003]);
        let id = allocate_monster_id(live).expect("id should be free");
        assert_eq!(id, MonsterId::new(20_002));
    }

    #[test]
    fn test_ignores_ids_below_floor() {
        let live = ids(&[1, 2, 19_999, 20_000]);
        let id = allocate_monster_id(live).expect("id should be free");
        assert_eq!(id, MonsterId::new(20_001));
    }

    #[test]
    fn test_exhausted() {
        let live = ids(&[10, 11, 12]);
        let result = allocate_in(live, 10, 13);
        assert!(matches!(
            result,
            Err(MonsterError::IdSpaceExhausted {
                floor: 10,
                ceiling: 13
            })
        ));
    }

    #[test]
    fn test_unsorted_input() {
        let live = ids(&[12, 10, 11, 14]);
        assert_eq!(
            allocate_in(live, 10, 20).expect("id should be free"),
            MonsterId::new(13)
        );
    }
}
