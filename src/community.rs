//! Greedy modularity community detection (Clauset, Newman & Moore).
//!
//! Communities start as singletons; the adjacent pair whose merge increases
//! modularity the most is merged until no merge helps. Gains are kept per
//! community pair and updated locally on every merge.

use crate::types::NodeIx;
use ahash::AHashMap as HashMap;
use std::collections::BTreeMap;

/// Partition `nodes` into communities of the undirected graph `edges`.
///
/// `edges` must be simple (no duplicates, no self loops) and only mention
/// members of `nodes`. Communities are returned largest first; members keep the
/// order they have in `nodes`. Without edges every node is its own community.
pub fn greedy_modularity_communities(
    nodes: &[NodeIx],
    edges: &[(NodeIx, NodeIx)],
) -> Vec<Vec<NodeIx>> {
    if nodes.len() <= 1 || edges.is_empty() {
        return nodes.iter().map(|&v| vec![v]).collect();
    }

    let local: HashMap<NodeIx, usize> = nodes.iter().enumerate().map(|(i, &v)| (v, i)).collect();
    let n = nodes.len();
    let m = edges.len() as f64;

    let mut degree = vec![0usize; n];
    let mut pairs = Vec::with_capacity(edges.len());
    for &(u, v) in edges {
        if let (Some(&i), Some(&j)) = (local.get(&u), local.get(&v)) {
            if i != j {
                degree[i] += 1;
                degree[j] += 1;
                pairs.push((i, j));
            }
        }
    }

    // a[i]: fraction of edge ends attached to community i
    let mut a: Vec<f64> = degree.iter().map(|&k| k as f64 / (2.0 * m)).collect();
    // BTreeMap rows keep the scan order, and so tie-breaking, deterministic
    let mut dq: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
    for &(i, j) in &pairs {
        let gain = 2.0 * (1.0 / (2.0 * m) - a[i] * a[j]);
        dq[i].insert(j, gain);
        dq[j].insert(i, gain);
    }

    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut alive = vec![true; n];

    loop {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..n {
            if !alive[i] {
                continue;
            }
            for (&j, &gain) in dq[i].range(i + 1..) {
                if !matches!(best, Some((b, _, _)) if gain <= b) {
                    best = Some((gain, i, j));
                }
            }
        }

        let (gain, i, j) = match best {
            Some(found) if found.0 > 0.0 => found,
            _ => break,
        };
        tracing::trace!("merge communities {} <- {} (dQ = {:.5})", i, j, gain);

        // j is merged into i
        let row_j = std::mem::take(&mut dq[j]);
        for (&k, &gain_jk) in &row_j {
            if k == i {
                continue;
            }
            let merged = match dq[i].get(&k) {
                Some(&gain_ik) => gain_ik + gain_jk,
                None => gain_jk - 2.0 * a[i] * a[k],
            };
            dq[i].insert(k, merged);
            dq[k].insert(i, merged);
            dq[k].remove(&j);
        }
        let only_i: Vec<usize> = dq[i]
            .keys()
            .copied()
            .filter(|&k| k != j && !row_j.contains_key(&k))
            .collect();
        for k in only_i {
            let updated = dq[i][&k] - 2.0 * a[j] * a[k];
            dq[i].insert(k, updated);
            dq[k].insert(i, updated);
        }
        dq[i].remove(&j);

        a[i] += a[j];
        a[j] = 0.0;
        let moved = std::mem::take(&mut members[j]);
        members[i].extend(moved);
        alive[j] = false;
    }

    let mut communities: Vec<Vec<NodeIx>> = members
        .into_iter()
        .zip(alive)
        .filter(|(_, alive)| *alive)
        .map(|(mut group, _)| {
            group.sort_unstable();
            group.into_iter().map(|i| nodes[i]).collect()
        })
        .collect();
    communities.sort_by(|x, y| y.len().cmp(&x.len()));
    communities
}

/// Newman modularity of a partition, for diagnostics and tests.
pub fn modularity(communities: &[Vec<NodeIx>], edges: &[(NodeIx, NodeIx)]) -> f64 {
    if edges.is_empty() {
        return 0.0;
    }
    let m = edges.len() as f64;
    let mut community_of: HashMap<NodeIx, usize> = HashMap::new();
    for (c, group) in communities.iter().enumerate() {
        for &v in group {
            community_of.insert(v, c);
        }
    }
    let mut inside = vec![0.0f64; communities.len()];
    let mut ends = vec![0.0f64; communities.len()];
    for &(u, v) in edges {
        let (Some(&cu), Some(&cv)) = (community_of.get(&u), community_of.get(&v)) else {
            continue;
        };
        ends[cu] += 1.0;
        ends[cv] += 1.0;
        if cu == cv {
            inside[cu] += 1.0;
        }
    }
    inside
        .iter()
        .zip(&ends)
        .map(|(l, d)| l / m - (d / (2.0 * m)).powi(2))
        .sum()
}
