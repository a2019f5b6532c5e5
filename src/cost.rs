//! Distance costs over a (possibly partial) slot assignment.
//!
//! Everything here is read-only. Links whose endpoints are not both assigned
//! are skipped, which lets the placer use the same functions mid-draft.

use crate::graph::LinkGraph;
use crate::slots::SlotMap;
use crate::types::{DistanceRule, DistanceStats, NodeIx, Slot, Violation};

pub fn evaluate(map: &SlotMap, g: &LinkGraph) -> DistanceStats {
    let mut total: u64 = 0;
    let mut links = 0usize;
    let mut maximum = 0u64;
    let mut minimum = u64::MAX;

    for link in g.links() {
        if let Some(d) = map.distance(link.source, link.dest) {
            total += d;
            links += 1;
            maximum = maximum.max(d);
            minimum = minimum.min(d);
        }
    }

    if links == 0 {
        return DistanceStats::default();
    }

    DistanceStats {
        average: total as f64 / links as f64,
        maximum,
        minimum,
        links,
    }
}

/// Sum of all measurable link distances.
pub fn total_distance(map: &SlotMap, g: &LinkGraph) -> u64 {
    g.links()
        .iter()
        .filter_map(|link| map.distance(link.source, link.dest))
        .sum()
}

/// Every link breaking one of `rules`, worst first.
///
/// A link breaking two rules (only possible with inconsistent thresholds)
/// is listed once per rule.
pub fn violations(map: &SlotMap, g: &LinkGraph, rules: &[DistanceRule]) -> Vec<Violation> {
    let mut found = Vec::new();
    for link in g.links() {
        let Some(distance) = map.distance(link.source, link.dest) else {
            continue;
        };
        for rule in rules {
            if let Some(severity) = rule.severity(distance) {
                found.push(Violation {
                    source: link.source,
                    dest: link.dest,
                    distance,
                    rule: *rule,
                    severity,
                });
            }
        }
    }
    // stable: equal severities keep link order
    found.sort_by(|a, b| b.severity.cmp(&a.severity));
    found
}

pub fn count_violations(map: &SlotMap, g: &LinkGraph, rules: &[DistanceRule]) -> usize {
    g.links()
        .iter()
        .filter_map(|link| map.distance(link.source, link.dest))
        .filter(|&d| rules.iter().any(|rule| rule.is_violated(d)))
        .count()
}

/// Slots already held by neighbors of `v`, one entry per link.
pub fn placed_neighbor_slots(map: &SlotMap, g: &LinkGraph, v: NodeIx) -> Vec<Slot> {
    g.neighbors(v).iter().filter_map(|&n| map.slot(n)).collect()
}

/// What exchanging the slots of two nodes would do to their incident links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapAssessment {
    /// Change of the total link distance (negative is better).
    pub delta: i64,
    /// Incident links breaking some rule before / after the swap.
    pub violated_before: usize,
    pub violated_after: usize,
    /// Incident links that break a rule after the swap but did not before.
    pub newly_violated: usize,
    /// Incident links closer than the minimum distance after the swap.
    pub too_close_after: usize,
}

impl SwapAssessment {
    /// No incident link ends up worse off with respect to the rules.
    #[inline]
    pub fn is_legal(&self) -> bool {
        self.newly_violated == 0
    }
}

#[inline]
fn slot_after_swap(map: &SlotMap, a: NodeIx, b: NodeIx, n: NodeIx) -> Option<Slot> {
    if n == a {
        map.slot(b)
    } else if n == b {
        map.slot(a)
    } else {
        map.slot(n)
    }
}

/// Evaluate swapping `a` and `b` over their full neighbor sets.
///
/// A link between `a` and `b` is seen from both ends; its length does not
/// change under the swap, so it never affects `delta` or the counts' balance.
pub fn assess_swap(
    map: &SlotMap,
    g: &LinkGraph,
    a: NodeIx,
    b: NodeIx,
    rules: &[DistanceRule],
) -> SwapAssessment {
    let mut out = SwapAssessment::default();
    let (Some(slot_a), Some(slot_b)) = (map.slot(a), map.slot(b)) else {
        return out;
    };

    for (v, before_at, after_at) in [(a, slot_a, slot_b), (b, slot_b, slot_a)] {
        for &n in g.neighbors(v) {
            let (Some(n_before), Some(n_after)) = (map.slot(n), slot_after_swap(map, a, b, n))
            else {
                continue;
            };
            let d_before = before_at.abs_diff(n_before);
            let d_after = after_at.abs_diff(n_after);
            out.delta += d_after as i64 - d_before as i64;

            let broke_before = rules.iter().any(|r| r.is_violated(d_before));
            let broke_after = rules.iter().any(|r| r.is_violated(d_after));
            if broke_before {
                out.violated_before += 1;
            }
            if broke_after {
                out.violated_after += 1;
            }
            if rules
                .iter()
                .any(|r| r.is_violated(d_after) && !r.is_violated(d_before))
            {
                out.newly_violated += 1;
            }
            if rules
                .iter()
                .any(|r| matches!(r, DistanceRule::Min(_)) && r.is_violated(d_after))
            {
                out.too_close_after += 1;
            }
        }
    }
    out
}
