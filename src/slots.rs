use crate::types::{NodeIx, Slot};
use ahash::AHashMap as HashMap;

/// Bijection between node indices and slots.
///
/// Filled incrementally by the placer, afterwards only ever mutated through
/// [`SlotMap::swap`]. Locked nodes can never be swapped. Breaking the bijection
/// is a bug in the caller and panics.
#[derive(Debug, Clone)]
pub struct SlotMap {
    slots: Vec<Option<Slot>>,
    occupants: HashMap<Slot, NodeIx>,
    locked: Vec<bool>,
}

impl SlotMap {
    pub fn new(node_count: usize) -> Self {
        SlotMap {
            slots: vec![None; node_count],
            occupants: HashMap::with_capacity(node_count),
            locked: vec![false; node_count],
        }
    }

    /// Number of assigned nodes.
    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slot(&self, v: NodeIx) -> Option<Slot> {
        self.slots.get(v).copied().flatten()
    }

    #[inline]
    pub fn occupant(&self, slot: Slot) -> Option<NodeIx> {
        self.occupants.get(&slot).copied()
    }

    #[inline]
    pub fn is_locked(&self, v: NodeIx) -> bool {
        self.locked.get(v).copied().unwrap_or(false)
    }

    #[inline]
    pub fn distance(&self, a: NodeIx, b: NodeIx) -> Option<u64> {
        match (self.slot(a), self.slot(b)) {
            (Some(sa), Some(sb)) => Some(sa.abs_diff(sb)),
            _ => None,
        }
    }

    pub fn assign(&mut self, v: NodeIx, slot: Slot) {
        if let Some(current) = self.slot(v) {
            panic!("node {} already holds slot {}", v, current);
        }
        if let Some(other) = self.occupant(slot) {
            panic!("slot {} already held by node {}", slot, other);
        }
        self.slots[v] = Some(slot);
        self.occupants.insert(slot, v);
    }

    /// Assign and pin: no later phase may move `v`.
    pub fn lock(&mut self, v: NodeIx, slot: Slot) {
        self.assign(v, slot);
        self.locked[v] = true;
    }

    pub fn swap(&mut self, a: NodeIx, b: NodeIx) {
        if self.is_locked(a) || self.is_locked(b) {
            panic!("attempted to swap locked node ({} <-> {})", a, b);
        }
        let (sa, sb) = match (self.slot(a), self.slot(b)) {
            (Some(sa), Some(sb)) => (sa, sb),
            _ => panic!("attempted to swap unassigned node ({} <-> {})", a, b),
        };
        self.slots[a] = Some(sb);
        self.slots[b] = Some(sa);
        self.occupants.insert(sb, a);
        self.occupants.insert(sa, b);
    }

    /// Check that every node holds exactly one slot of `[start, start + count)`.
    pub fn verify_bijection(&self, start: Slot, count: usize) -> Result<(), String> {
        if self.slots.len() != count {
            return Err(format!(
                "map covers {} nodes, expected {}",
                self.slots.len(),
                count
            ));
        }
        let end = start + count as Slot;
        for (v, slot) in self.slots.iter().enumerate() {
            match slot {
                None => return Err(format!("node {} has no slot", v)),
                Some(s) if *s < start || *s >= end => {
                    return Err(format!("node {} holds slot {} outside [{}, {})", v, s, start, end))
                }
                Some(s) if self.occupants.get(s) != Some(&v) => {
                    return Err(format!("slot {} is not owned by node {}", s, v))
                }
                Some(_) => {}
            }
        }
        if self.occupants.len() != count {
            return Err(format!(
                "{} slots occupied for {} nodes",
                self.occupants.len(),
                count
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_swap() {
        let mut map = SlotMap::new(3);
        map.assign(0, 10);
        map.assign(1, 11);
        map.assign(2, 12);
        map.swap(0, 2);
        assert_eq!(map.slot(0), Some(12));
        assert_eq!(map.slot(2), Some(10));
        assert_eq!(map.occupant(10), Some(2));
        assert_eq!(map.distance(0, 1), Some(1));
        assert!(map.verify_bijection(10, 3).is_ok());
    }

    #[test]
    fn test_verify_detects_gap() {
        let mut map = SlotMap::new(2);
        map.assign(0, 1);
        assert!(map.verify_bijection(1, 2).is_err());
        map.assign(1, 5);
        assert!(map.verify_bijection(1, 2).is_err());
    }

    #[test]
    #[should_panic(expected = "already held")]
    fn test_double_booking_panics() {
        let mut map = SlotMap::new(2);
        map.assign(0, 1);
        map.assign(1, 1);
    }

    #[test]
    #[should_panic(expected = "locked")]
    fn test_locked_swap_panics() {
        let mut map = SlotMap::new(2);
        map.lock(0, 1);
        map.assign(1, 2);
        map.swap(0, 1);
    }

    #[test]
    fn test_negative_start() {
        let mut map = SlotMap::new(2);
        map.assign(0, -1);
        map.assign(1, 0);
        assert_eq!(map.distance(0, 1), Some(1));
        assert!(map.verify_bijection(-1, 2).is_ok());
    }
}
