use crate::error::{RenumberError, Result};
use crate::slots::SlotMap;
use crate::types::{NodeIx, Slot};
use std::ops::RangeInclusive;

/// The `count` consecutive slots starting at `start`.
///
/// Fails with a structural error when the range does not fit in `i64`.
pub fn slot_range(start: Slot, count: usize) -> Result<Vec<Slot>> {
    let available = usize::try_from(Slot::MAX.saturating_sub(start)).unwrap_or(usize::MAX);
    let overflow = RenumberError::Structural {
        needed: count,
        available,
    };
    let len = Slot::try_from(count).map_err(|_| overflow)?;
    match start.checked_add(len) {
        Some(end) => Ok((start..end).collect()),
        None => Err(RenumberError::Structural {
            needed: count,
            available,
        }),
    }
}

/// Inclusive bounds of a slot pool, empty when the pool is.
pub fn slot_bounds(pool: &[Slot]) -> RangeInclusive<Slot> {
    match (pool.first(), pool.last()) {
        (Some(&first), Some(&last)) => first..=last,
        // an empty inclusive range
        _ => 1..=0,
    }
}

/// Nodes a swap may move, in index order.
pub fn unlocked_nodes(map: &SlotMap) -> Vec<NodeIx> {
    (0..map.node_count())
        .filter(|&v| !map.is_locked(v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_range() {
        assert_eq!(slot_range(1, 4).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(slot_range(-2, 3).unwrap(), vec![-2, -1, 0]);
        assert!(slot_range(7, 0).unwrap().is_empty());
    }

    #[test]
    fn test_slot_range_overflow() {
        let err = slot_range(Slot::MAX - 1, 3).unwrap_err();
        assert!(err.is_structural());
        assert!(slot_range(Slot::MAX - 3, 3).is_ok());
    }

    #[test]
    fn test_slot_bounds() {
        assert_eq!(slot_bounds(&[3, 4, 5]), 3..=5);
        assert!(slot_bounds(&[]).is_empty());
    }

    #[test]
    fn test_unlocked_nodes() {
        let mut map = SlotMap::new(3);
        map.lock(1, 1);
        assert_eq!(unlocked_nodes(&map), vec![0, 2]);
    }
}
