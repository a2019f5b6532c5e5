use crate::community::{greedy_modularity_communities, modularity};
use crate::graph::LinkGraph;
use crate::types::NodeIx;
use ahash::AHashMap as HashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Cluster the free (non-locked) nodes into densely linked zones.
pub fn build_zones(g: &LinkGraph, free: &[NodeIx]) -> Vec<Vec<NodeIx>> {
    let edges = g.undirected_edges(free);
    let zones = greedy_modularity_communities(free, &edges);
    tracing::debug!(
        "{} zones over {} links, modularity {:.4}",
        zones.len(),
        edges.len(),
        modularity(&zones, &edges)
    );
    zones
}

/// Cross-zone link counts, keyed by `(low, high)` zone index.
fn meta_weights(g: &LinkGraph, zones: &[Vec<NodeIx>]) -> BTreeMap<(usize, usize), u64> {
    let zone_of: HashMap<NodeIx, usize> = zones
        .iter()
        .enumerate()
        .flat_map(|(z, members)| members.iter().map(move |&v| (v, z)))
        .collect();

    let mut weights = BTreeMap::new();
    for link in g.links() {
        let (Some(&zs), Some(&zd)) = (zone_of.get(&link.source), zone_of.get(&link.dest)) else {
            continue;
        };
        if zs == zd {
            continue;
        }
        let key = if zs < zd { (zs, zd) } else { (zd, zs) };
        *weights.entry(key).or_insert(0) += 1;
    }
    weights
}

#[inline]
fn weight(weights: &BTreeMap<(usize, usize), u64>, x: usize, y: usize) -> u64 {
    let key = if x < y { (x, y) } else { (y, x) };
    weights.get(&key).copied().unwrap_or(0)
}

/// Order zones so that heavily cross-linked zones get adjacent slot blocks.
///
/// The path starts from the heaviest zone pair and grows one zone at a time,
/// attaching the zone with the strongest link to either end of the path.
/// When nothing links to either end, the remaining zone with the most
/// cross-zone links goes to the back and growth continues from it. Zones
/// with no cross-zone link at all are appended in random order; without any
/// cross-zone link the whole order is random.
pub fn order_zones<R: Rng + ?Sized>(
    g: &LinkGraph,
    mut zones: Vec<Vec<NodeIx>>,
    rng: &mut R,
) -> Vec<Vec<NodeIx>> {
    if zones.len() <= 1 {
        return zones;
    }

    let weights = meta_weights(g, &zones);
    if weights.is_empty() {
        zones.shuffle(rng);
        return zones;
    }

    let mut start = ((0, 0), 0u64);
    for (&pair, &w) in &weights {
        if w > start.1 {
            start = (pair, w);
        }
    }
    let ((first, second), _) = start;

    let mut degree = vec![0u64; zones.len()];
    for (&(x, y), &w) in &weights {
        degree[x] += w;
        degree[y] += w;
    }

    let mut path: VecDeque<usize> = VecDeque::from(vec![first, second]);
    let mut remaining: BTreeSet<usize> = (0..zones.len())
        .filter(|&z| z != first && z != second)
        .collect();

    while !remaining.is_empty() {
        let front = path[0];
        let back = path[path.len() - 1];
        let mut best: Option<(u64, usize, bool)> = None;
        for &z in &remaining {
            let score_front = weight(&weights, z, front);
            let score_back = weight(&weights, z, back);
            let current = best.map_or(0, |(s, _, _)| s);
            if score_front > current {
                best = Some((score_front, z, false));
            }
            let current = best.map_or(0, |(s, _, _)| s);
            if score_back > current {
                best = Some((score_back, z, true));
            }
        }

        match best {
            Some((_, z, at_back)) => {
                if at_back {
                    path.push_back(z);
                } else {
                    path.push_front(z);
                }
                remaining.remove(&z);
            }
            None => {
                let mut linked: Option<usize> = None;
                for &z in &remaining {
                    if degree[z] > linked.map_or(0, |l| degree[l]) {
                        linked = Some(z);
                    }
                }
                if let Some(z) = linked {
                    path.push_back(z);
                    remaining.remove(&z);
                    continue;
                }
                let mut rest: Vec<usize> = remaining.iter().copied().collect();
                rest.shuffle(rng);
                path.extend(rest);
                break;
            }
        }
    }

    let mut slots: Vec<Option<Vec<NodeIx>>> = zones.into_iter().map(Some).collect();
    path.into_iter()
        .filter_map(|z| slots.get_mut(z).and_then(Option::take))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn graph(n: usize, links: &[(usize, usize)]) -> LinkGraph {
        let mut g = LinkGraph::new();
        for i in 0..n {
            g.add_node(&format!("n{}", i)).unwrap();
        }
        for &(s, d) in links {
            g.add_link(&format!("n{}", s), &format!("n{}", d));
        }
        g
    }

    #[test]
    fn test_build_zones_on_free_subgraph() {
        // two triangles bridged by 2-3; node 6 is locked and excluded
        let g = graph(
            7,
            &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (2, 3), (6, 0), (6, 4)],
        );
        let zones = build_zones(&g, &[0, 1, 2, 3, 4, 5]);
        assert_eq!(zones, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_order_follows_strongest_links() {
        // zones a={0} b={1} c={2} d={3}; weights a-c 3, c-d 2, b-a 1
        let g = graph(
            4,
            &[(0, 2), (2, 0), (0, 2), (2, 3), (3, 2), (1, 0)],
        );
        let zones = vec![vec![0], vec![1], vec![2], vec![3]];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let ordered = order_zones(&g, zones, &mut rng);
        assert_eq!(ordered, vec![vec![1], vec![0], vec![2], vec![3]]);
    }

    #[test]
    fn test_isolated_zones_are_kept() {
        let g = graph(5, &[(0, 1), (1, 0)]);
        let zones = vec![vec![0], vec![1], vec![2], vec![3, 4]];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let ordered = order_zones(&g, zones, &mut rng);
        assert_eq!(ordered.len(), 4);
        assert_eq!(&ordered[..2], &[vec![0], vec![1]]);
        let mut all: Vec<NodeIx> = ordered.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_detached_linked_zones_stay_together() {
        // 0-1 weighs 3, 2-3 weighs 1 but touches neither, 4 has no link
        let g = graph(5, &[(0, 1), (1, 0), (0, 1), (2, 3)]);
        for seed in 0..50 {
            let zones: Vec<Vec<NodeIx>> = (0..5).map(|v| vec![v]).collect();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let ordered = order_zones(&g, zones, &mut rng);
            assert_eq!(
                ordered,
                vec![vec![0], vec![1], vec![2], vec![3], vec![4]],
                "seed {}",
                seed
            );
        }
    }

    #[test]
    fn test_unlinked_zones_are_permuted() {
        let g = graph(6, &[]);
        let zones: Vec<Vec<NodeIx>> = (0..6).map(|v| vec![v]).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let ordered = order_zones(&g, zones.clone(), &mut rng);
        let mut sorted = ordered.clone();
        sorted.sort();
        assert_eq!(sorted, zones);
    }
}
