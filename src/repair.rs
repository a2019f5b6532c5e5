use crate::cost::{assess_swap, violations, SwapAssessment};
use crate::graph::LinkGraph;
use crate::slots::SlotMap;
use crate::types::{DistanceRule, NodeIx, RepairStrategy, Slot, Unsatisfiable};
use ahash::AHashSet as HashSet;
use rand::Rng;
use std::ops::RangeInclusive;

/// Worst violations looked at per pass.
pub const REPAIR_WINDOW: usize = 32;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairSummary {
    pub passes: usize,
    pub swaps: usize,
    pub unsatisfiable: Vec<Unsatisfiable>,
}

impl RepairStrategy {
    /// Whether a swap with this assessment may be committed.
    #[inline]
    pub fn accepts(&self, assessment: &SwapAssessment) -> bool {
        match self {
            RepairStrategy::ReduceAverage => assessment.is_legal() && assessment.delta < 0,
            RepairStrategy::SatisfyConstraint => {
                assessment.violated_after <= assessment.violated_before
            }
        }
    }

    /// Partners must put the mover on the legal side of the anchor.
    #[inline]
    fn needs_fixing_partner(&self) -> bool {
        matches!(self, RepairStrategy::ReduceAverage)
    }
}

/// Slot the mover should land on: as close to the anchor as `rule` allows,
/// staying on the side of the anchor it is on now.
fn target_slot(rule: DistanceRule, anchor: Slot, mover: Slot, range: &RangeInclusive<Slot>) -> Slot {
    let offset = Slot::try_from(rule.threshold()).unwrap_or(Slot::MAX);
    let target = if mover < anchor {
        anchor.saturating_sub(offset)
    } else {
        anchor.saturating_add(offset)
    };
    target.clamp(*range.start(), *range.end())
}

/// Best swap partner for `mover` against the violated link to `anchor`.
///
/// Ranked by the drop in broken incident links, then by distance to the
/// target slot, then by cost change. Returns `(partner, delta)`.
#[allow(clippy::too_many_arguments)]
fn best_partner(
    map: &SlotMap,
    g: &LinkGraph,
    free: &[NodeIx],
    rules: &[DistanceRule],
    rule: DistanceRule,
    strategy: RepairStrategy,
    mover: NodeIx,
    anchor: NodeIx,
    range: &RangeInclusive<Slot>,
) -> Option<(NodeIx, i64)> {
    let (Some(anchor_slot), Some(mover_slot)) = (map.slot(anchor), map.slot(mover)) else {
        return None;
    };
    let target = target_slot(rule, anchor_slot, mover_slot, range);

    // (partner, (violation change, distance to target, delta))
    let mut best: Option<(NodeIx, (i64, u64, i64))> = None;
    for &partner in free {
        if partner == mover || partner == anchor || map.is_locked(partner) {
            continue;
        }
        let Some(partner_slot) = map.slot(partner) else {
            continue;
        };
        if strategy.needs_fixing_partner() && rule.is_violated(partner_slot.abs_diff(anchor_slot)) {
            continue;
        }
        let assessment = assess_swap(map, g, mover, partner, rules);
        if !strategy.accepts(&assessment) {
            continue;
        }
        let key = (
            assessment.violated_after as i64 - assessment.violated_before as i64,
            partner_slot.abs_diff(target),
            assessment.delta,
        );
        if !matches!(best, Some((_, best_key)) if best_key <= key) {
            best = Some((partner, key));
        }
    }
    best.map(|(partner, (_, _, delta))| (partner, delta))
}

/// Targeted violation repair by pairwise swaps.
///
/// Runs at most `passes` passes over the worst violations. Each violation
/// moves one non-locked endpoint, falling back to the other one when the
/// first finds no partner, by swapping it with the partner that lands closest
/// to the legal position next to the other endpoint.
///
/// `ReduceAverage` only takes swaps that fix the link, break no other link and
/// shorten the total distance. `SatisfyConstraint` takes any swap that does not
/// raise the number of broken links around the pair, whatever it costs, so the
/// search can cross plateaus while the violation count never grows.
/// Links between two locked nodes are reported once and left alone.
#[allow(clippy::too_many_arguments)]
pub fn repair<R: Rng + ?Sized>(
    map: &mut SlotMap,
    g: &LinkGraph,
    free: &[NodeIx],
    rules: &[DistanceRule],
    strategy: RepairStrategy,
    passes: usize,
    range: RangeInclusive<Slot>,
    rng: &mut R,
) -> RepairSummary {
    let mut summary = RepairSummary::default();
    let mut reported: HashSet<(NodeIx, NodeIx, DistanceRule)> = HashSet::new();

    for pass in 0..passes {
        summary.passes += 1;
        let found = violations(map, g, rules);
        if found.is_empty() {
            tracing::debug!("repair pass {}: no violations left", pass + 1);
            break;
        }

        let mut committed = 0;
        for violation in found.iter().take(REPAIR_WINDOW) {
            let (s, d, rule) = (violation.source, violation.dest, violation.rule);
            // an earlier swap of this pass may already have fixed it
            match map.distance(s, d) {
                Some(distance) if rule.is_violated(distance) => {}
                _ => continue,
            }

            let movers = match (map.is_locked(s), map.is_locked(d)) {
                (true, true) => {
                    if reported.insert((s, d, rule)) {
                        tracing::warn!(
                            "link {} -> {} breaks {:?} between two locked nodes",
                            g.id(s),
                            g.id(d),
                            rule
                        );
                        summary.unsatisfiable.push(Unsatisfiable::LockedEndpoints {
                            source: g.id(s).to_string(),
                            dest: g.id(d).to_string(),
                            distance: violation.distance,
                            rule,
                        });
                    }
                    continue;
                }
                (true, false) => [Some(d), None],
                (false, true) => [Some(s), None],
                (false, false) => {
                    if rng.gen_bool(0.5) {
                        [Some(s), Some(d)]
                    } else {
                        [Some(d), Some(s)]
                    }
                }
            };

            for mover in movers.into_iter().flatten() {
                let anchor = if mover == s { d } else { s };
                let Some((partner, delta)) =
                    best_partner(map, g, free, rules, rule, strategy, mover, anchor, &range)
                else {
                    continue;
                };
                tracing::trace!(
                    "swap {} <-> {} for {} -> {} ({:?}, delta {})",
                    g.id(mover),
                    g.id(partner),
                    g.id(s),
                    g.id(d),
                    rule,
                    delta
                );
                map.swap(mover, partner);
                committed += 1;
                break;
            }
        }

        summary.swaps += committed;
        tracing::debug!(
            "repair pass {}: {} violations, {} swaps",
            pass + 1,
            found.len(),
            committed
        );
        if committed == 0 {
            break;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{count_violations, total_distance};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn graph(ids: &[&str], links: &[(&str, &str)]) -> LinkGraph {
        let mut g = LinkGraph::new();
        for id in ids {
            g.add_node(id).unwrap();
        }
        for (s, d) in links {
            g.add_link(s, d);
        }
        g
    }

    /// Assign ids to slots 1.. in the given order, locking the listed ones.
    fn place(g: &LinkGraph, order: &[&str], locked: &[&str]) -> SlotMap {
        let mut map = SlotMap::new(g.node_count());
        for (i, id) in order.iter().enumerate() {
            let v = g.index_of(id).unwrap();
            if locked.contains(id) {
                map.lock(v, i as Slot + 1);
            } else {
                map.assign(v, i as Slot + 1);
            }
        }
        map
    }

    fn free_nodes(map: &SlotMap) -> Vec<NodeIx> {
        (0..map.node_count()).filter(|&v| !map.is_locked(v)).collect()
    }

    #[test]
    fn test_target_slot_stays_on_side() {
        assert_eq!(target_slot(DistanceRule::Min(3), 5, 4, &(1..=10)), 2);
        assert_eq!(target_slot(DistanceRule::Min(3), 5, 6, &(1..=10)), 8);
        assert_eq!(target_slot(DistanceRule::Max(3), 9, 1, &(1..=10)), 6);
        assert_eq!(target_slot(DistanceRule::Min(4), 2, 1, &(1..=10)), 1);
    }

    #[test]
    fn test_target_slot_huge_threshold_clamps() {
        assert_eq!(target_slot(DistanceRule::Min(u64::MAX), 5, 6, &(1..=10)), 10);
        assert_eq!(target_slot(DistanceRule::Max(u64::MAX), 5, 4, &(1..=10)), 1);
    }

    #[test]
    fn test_fixes_max_violation_closest_to_target() {
        let ids = ["a", "c", "d", "e", "f", "h", "i", "b"];
        let g = graph(&ids, &[("a", "b")]);
        let mut map = place(&g, &ids, &["b"]);
        let free = free_nodes(&map);
        let rules = [DistanceRule::Max(3)];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let summary = repair(&mut map, &g, &free, &rules, RepairStrategy::ReduceAverage, 4, 1..=8, &mut rng);
        assert_eq!(summary.swaps, 1);
        // anchor at 8, three below it
        assert_eq!(map.slot(g.index_of("a").unwrap()), Some(5));
        assert_eq!(count_violations(&map, &g, &rules), 0);
    }

    #[test]
    fn test_fixes_min_violation_when_cost_drops() {
        // a sits next to locked b and far from locked g, which it links to twice
        let order = ["c", "a", "b", "d", "e", "f", "h", "g"];
        let g = graph(&order, &[("a", "b"), ("a", "g"), ("a", "g")]);
        let mut map = place(&g, &order, &["b", "g"]);
        let free = free_nodes(&map);
        let rules = [DistanceRule::Min(2)];
        let before = total_distance(&map, &g);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let summary = repair(&mut map, &g, &free, &rules, RepairStrategy::ReduceAverage, 3, 1..=8, &mut rng);
        assert_eq!(summary.swaps, 1);
        assert_eq!(map.slot(g.index_of("a").unwrap()), Some(5));
        assert!(total_distance(&map, &g) < before);
        assert_eq!(count_violations(&map, &g, &rules), 0);
    }

    #[test]
    fn test_cost_increase_needs_satisfy_constraint() {
        // the only fix moves "a" away from everything it links to
        let order = ["a", "b", "c", "d"];
        let g = graph(&order, &[("a", "b")]);
        let rules = [DistanceRule::Min(2)];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut map = place(&g, &order, &["b"]);
        let free = free_nodes(&map);
        let summary = repair(&mut map, &g, &free, &rules, RepairStrategy::ReduceAverage, 5, 1..=4, &mut rng);
        assert_eq!(summary.swaps, 0);
        assert_eq!(summary.passes, 1);

        let mut map = place(&g, &order, &["b"]);
        let summary = repair(&mut map, &g, &free, &rules, RepairStrategy::SatisfyConstraint, 5, 1..=4, &mut rng);
        assert_eq!(summary.swaps, 1);
        assert_eq!(map.slot(g.index_of("a").unwrap()), Some(4));
        assert_eq!(count_violations(&map, &g, &rules), 0);
        assert_eq!(total_distance(&map, &g), 2);
    }

    #[test]
    fn test_other_endpoint_moves_when_first_is_stuck() {
        // "a" cannot leave "b" without lengthening links; "b" is pulled
        // toward locked "g" and can
        let order = ["c", "a", "b", "d", "e", "f", "h", "g"];
        let g = graph(&order, &[("a", "b"), ("b", "g"), ("b", "g")]);
        let rules = [DistanceRule::Min(2)];
        for seed in 0..8 {
            let mut map = place(&g, &order, &["g"]);
            let free = free_nodes(&map);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let summary = repair(&mut map, &g, &free, &rules, RepairStrategy::ReduceAverage, 3, 1..=8, &mut rng);
            assert_eq!(summary.swaps, 1);
            assert_eq!(map.slot(g.index_of("a").unwrap()), Some(2));
            assert_eq!(map.slot(g.index_of("b").unwrap()), Some(4));
            assert_eq!(count_violations(&map, &g, &rules), 0);
        }
    }

    #[test]
    fn test_satisfy_constraint_spreads_chain() {
        // 1 -> 2 -> ... -> 6 needs 3,6,2,5,1,4 or its mirror
        let ids = ["1", "2", "3", "4", "5", "6"];
        let links: Vec<(&str, &str)> = ids.windows(2).map(|w| (w[0], w[1])).collect();
        let g = graph(&ids, &links);
        let rules = [DistanceRule::Min(3)];
        for seed in 0..16 {
            let mut map = place(&g, &ids, &[]);
            let free = free_nodes(&map);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            repair(&mut map, &g, &free, &rules, RepairStrategy::SatisfyConstraint, 200, 1..=6, &mut rng);
            assert_eq!(count_violations(&map, &g, &rules), 0, "seed {}", seed);
            assert!(map.verify_bijection(1, 6).is_ok());
        }
    }

    #[test]
    fn test_locked_endpoints_reported_once() {
        let order = ["a", "b", "c", "d"];
        let g = graph(&order, &[("a", "b"), ("c", "d")]);
        let mut map = place(&g, &order, &["a", "b"]);
        let free = free_nodes(&map);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let summary = repair(
            &mut map,
            &g,
            &free,
            &[DistanceRule::Min(3)],
            RepairStrategy::SatisfyConstraint,
            5,
            1..=4,
            &mut rng,
        );
        assert_eq!(summary.unsatisfiable.len(), 1);
        assert!(matches!(
            &summary.unsatisfiable[0],
            Unsatisfiable::LockedEndpoints { source, dest, distance: 1, .. } if source == "a" && dest == "b"
        ));
        assert_eq!(map.slot(0), Some(1));
        assert_eq!(map.slot(1), Some(2));
    }

    #[test]
    fn test_zero_budget_does_nothing() {
        let order = ["a", "b", "c"];
        let g = graph(&order, &[("a", "b")]);
        let mut map = place(&g, &order, &[]);
        let free = free_nodes(&map);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let summary = repair(&mut map, &g, &free, &[DistanceRule::Min(2)], RepairStrategy::default(), 0, 1..=3, &mut rng);
        assert_eq!(summary, RepairSummary::default());
    }

    #[test]
    fn test_never_lengthens_links_or_moves_locks() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let n = 30;
        let ids: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let mut g = LinkGraph::new();
        for id in &ids {
            g.add_node(id).unwrap();
        }
        for _ in 0..60 {
            let s = rng.gen_range(0..n);
            let d = rng.gen_range(0..n);
            g.add_link(&ids[s], &ids[d]);
        }
        let mut map = SlotMap::new(n);
        map.lock(0, 1);
        map.lock(7, 8);
        for v in 0..n {
            if map.slot(v).is_none() {
                map.assign(v, v as Slot + 1);
            }
        }
        let free = free_nodes(&map);
        let rules = [DistanceRule::Min(4), DistanceRule::Max(12)];

        let before = total_distance(&map, &g);
        repair(&mut map, &g, &free, &rules, RepairStrategy::ReduceAverage, 10, 1..=n as Slot, &mut rng);
        assert!(total_distance(&map, &g) <= before);
        assert_eq!(map.slot(0), Some(1));
        assert_eq!(map.slot(7), Some(8));
        assert!(map.verify_bijection(1, n).is_ok());

        let before = count_violations(&map, &g, &rules);
        repair(&mut map, &g, &free, &rules, RepairStrategy::SatisfyConstraint, 10, 1..=n as Slot, &mut rng);
        assert!(count_violations(&map, &g, &rules) <= before);
        assert_eq!(map.slot(0), Some(1));
        assert_eq!(map.slot(7), Some(8));
        assert!(map.verify_bijection(1, n).is_ok());
    }
}
