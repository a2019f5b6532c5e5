use crate::cost::assess_swap;
use crate::graph::LinkGraph;
use crate::slots::SlotMap;
use crate::types::{DistanceRule, NodeIx, REFINE_BATCH_SIZE};
use rand::Rng;

const PROGRESS_EVERY: usize = 10_000;

/// Randomized pairwise-swap hill climbing over the non-locked nodes.
///
/// Performs `batches * REFINE_BATCH_SIZE` attempts. A swap is kept only if it
/// strictly shortens the total link distance and leaves every incident link
/// within the rules it satisfied before. Returns the number of kept swaps.
pub fn refine<R: Rng + ?Sized>(
    map: &mut SlotMap,
    g: &LinkGraph,
    free: &[NodeIx],
    rules: &[DistanceRule],
    batches: usize,
    rng: &mut R,
) -> usize {
    if free.len() < 2 || batches == 0 {
        return 0;
    }

    let attempts = batches.saturating_mul(REFINE_BATCH_SIZE);
    let mut swaps = 0;
    let mut gained: i64 = 0;

    for attempt in 1..=attempts {
        let i = rng.gen_range(0..free.len());
        let mut j = rng.gen_range(0..free.len() - 1);
        if j >= i {
            j += 1;
        }
        let (a, b) = (free[i], free[j]);

        let assessment = assess_swap(map, g, a, b, rules);
        if assessment.delta < 0 && assessment.too_close_after == 0 && assessment.is_legal() {
            map.swap(a, b);
            swaps += 1;
            gained -= assessment.delta;
        }

        if attempt % PROGRESS_EVERY == 0 {
            tracing::debug!(
                "refine: {}/{} attempts, {} swaps, total distance -{}",
                attempt,
                attempts,
                swaps,
                gained
            );
        }
    }

    swaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{count_violations, total_distance};
    use crate::types::Slot;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn chain(n: usize) -> LinkGraph {
        let mut g = LinkGraph::new();
        for i in 0..n {
            g.add_node(&i.to_string()).unwrap();
        }
        for i in 1..n {
            g.add_link(&(i - 1).to_string(), &i.to_string());
        }
        g
    }

    fn scrambled(g: &LinkGraph, slots: &[Slot]) -> SlotMap {
        let mut map = SlotMap::new(g.node_count());
        for (v, &s) in slots.iter().enumerate() {
            map.assign(v, s);
        }
        map
    }

    #[test]
    fn test_shortens_scrambled_chain() {
        let g = chain(6);
        let mut map = scrambled(&g, &[1, 6, 2, 5, 3, 4]);
        let free: Vec<NodeIx> = (0..6).collect();
        let before = total_distance(&map, &g);
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let swaps = refine(&mut map, &g, &free, &[], 5, &mut rng);
        assert!(swaps > 0);
        assert!(total_distance(&map, &g) < before);
        assert!(map.verify_bijection(1, 6).is_ok());
    }

    #[test]
    fn test_respects_min_distance() {
        let g = chain(8);
        let mut map = scrambled(&g, &[1, 4, 7, 2, 5, 8, 3, 6]);
        let free: Vec<NodeIx> = (0..8).collect();
        let rules = [DistanceRule::Min(3)];
        assert_eq!(count_violations(&map, &g, &rules), 0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        refine(&mut map, &g, &free, &rules, 3, &mut rng);
        assert_eq!(count_violations(&map, &g, &rules), 0);
    }

    #[test]
    fn test_locked_nodes_stay() {
        let g = chain(6);
        let mut map = SlotMap::new(6);
        map.lock(0, 6);
        map.lock(5, 1);
        for v in 1..5 {
            map.assign(v, v as Slot + 1);
        }
        let free: Vec<NodeIx> = (1..5).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        refine(&mut map, &g, &free, &[], 2, &mut rng);
        assert_eq!(map.slot(0), Some(6));
        assert_eq!(map.slot(5), Some(1));
    }

    #[test]
    fn test_noop_cases() {
        let g = chain(3);
        let mut map = scrambled(&g, &[3, 1, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(refine(&mut map, &g, &[1], &[], 4, &mut rng), 0);
        assert_eq!(refine(&mut map, &g, &[0, 1, 2], &[], 0, &mut rng), 0);
        assert_eq!(map.slot(0), Some(3));
    }
}
