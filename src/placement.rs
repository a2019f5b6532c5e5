use crate::cost::placed_neighbor_slots;
use crate::error::{RenumberError, Result};
use crate::graph::LinkGraph;
use crate::slots::SlotMap;
use crate::types::{ForcedPlacement, NodeIx, Slot};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

/// Place each group into its own consecutive block of `pool`, in order.
///
/// The first group takes the first `groups[0].len()` slots of the pool, the
/// next group the following ones, and so on.
pub fn place_groups<R: Rng + ?Sized>(
    map: &mut SlotMap,
    g: &LinkGraph,
    groups: &[Vec<NodeIx>],
    pool: &[Slot],
    min_distance: u64,
    rng: &mut R,
) -> Result<Vec<ForcedPlacement>> {
    let needed: usize = groups.iter().map(Vec::len).sum();
    if needed > pool.len() {
        return Err(RenumberError::Structural {
            needed,
            available: pool.len(),
        });
    }

    let mut forced = Vec::new();
    let mut offset = 0;
    for (i, group) in groups.iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        let block = &pool[offset..offset + group.len()];
        offset += group.len();
        tracing::debug!(
            "placing zone {}/{} ({} nodes) in block [{}..{}]",
            i + 1,
            groups.len(),
            group.len(),
            block[0],
            block[block.len() - 1]
        );
        forced.extend(place_group(map, g, group, block, min_distance, rng));
    }
    Ok(forced)
}

/// Greedy placement of one group into a block of exactly its size.
///
/// Each node takes the free slot closest (in total distance) to its already
/// placed neighbors among the slots keeping at least `min_distance` from all
/// of them. Nodes with no such slot wait until something else got placed; when
/// a whole round places nothing, the waiting nodes are forced onto the lowest
/// free slots and reported.
pub fn place_group<R: Rng + ?Sized>(
    map: &mut SlotMap,
    g: &LinkGraph,
    group: &[NodeIx],
    block: &[Slot],
    min_distance: u64,
    rng: &mut R,
) -> Vec<ForcedPlacement> {
    debug_assert_eq!(group.len(), block.len());

    let mut available: Vec<Slot> = block.to_vec();
    available.sort_unstable();

    let mut order: Vec<NodeIx> = group.to_vec();
    order.shuffle(rng);
    let mut queue: VecDeque<NodeIx> = order.into();
    let mut deferred: Vec<NodeIx> = Vec::new();

    while let Some(v) = queue.pop_front() {
        let neighbor_slots = placed_neighbor_slots(map, g, v);

        let mut best: Option<(usize, u64)> = None;
        for (i, &candidate) in available.iter().enumerate() {
            if neighbor_slots
                .iter()
                .any(|&s| candidate.abs_diff(s) < min_distance)
            {
                continue;
            }
            let cost: u64 = neighbor_slots.iter().map(|&s| candidate.abs_diff(s)).sum();
            if !matches!(best, Some((_, c)) if c <= cost) {
                best = Some((i, cost));
            }
        }

        match best {
            Some((i, _)) => {
                let slot = available.remove(i);
                map.assign(v, slot);
                // a new neighbor may have opened room for the waiting ones
                queue.extend(deferred.drain(..));
            }
            None => deferred.push(v),
        }
    }

    let mut forced = Vec::with_capacity(deferred.len());
    for v in deferred {
        if available.is_empty() {
            // unreachable while blocks match group sizes
            tracing::error!("no slot left for '{}'", g.id(v));
            continue;
        }
        let slot = available.remove(0);
        let conflicts: Vec<Slot> = placed_neighbor_slots(map, g, v)
            .into_iter()
            .filter(|&s| slot.abs_diff(s) < min_distance)
            .collect();
        map.assign(v, slot);
        tracing::warn!(
            "could not keep '{}' {} away from its neighbors, forced onto slot {} (too close to {:?})",
            g.id(v),
            min_distance,
            slot,
            conflicts
        );
        forced.push(ForcedPlacement {
            node: g.id(v).to_string(),
            slot,
            conflicts,
        });
    }
    forced
}
