use crate::error::{RenumberError, Result};
use crate::references::destination_tokens;
use crate::types::{NodeIx, NodeRecord};
use ahash::AHashSet as HashSet;
use indexmap::IndexMap;
use std::sync::Arc;

// Helper function to convert &str to Arc<str>
#[inline]
pub fn arc_str(s: &str) -> Arc<str> {
    Arc::from(s)
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub v: Arc<str>,
    // Adjacency keeps duplicates: a passage linking twice to the same target
    // weighs that link twice in every cost
    pub successors: Vec<NodeIx>,
    pub predecessors: Vec<NodeIx>,
    // successors followed by predecessors, the "neighbor" view used by costs
    pub neighbors: Vec<NodeIx>,
}

impl GraphNode {
    fn new(v: Arc<str>) -> Self {
        GraphNode {
            v,
            successors: Vec::new(),
            predecessors: Vec::new(),
            neighbors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub source: NodeIx,
    pub dest: NodeIx,
}

/// Directed reference graph between passages.
///
/// Nodes keep the order they were added in; that order is the node index.
/// Built once, then only read by the optimisation phases.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    nodes: IndexMap<Arc<str>, GraphNode>,
    links: Vec<Link>,
    dropped_links: usize,
}

impl LinkGraph {
    pub fn new() -> Self {
        LinkGraph::default()
    }

    /// Build nodes from the records, then links from the markers in their content.
    pub fn from_records(records: &[NodeRecord]) -> Result<Self> {
        let mut g = LinkGraph::new();
        for record in records {
            g.add_node(&record.original_id)?;
        }
        for record in records {
            for dest in destination_tokens(&record.content) {
                g.add_link(&record.original_id, dest);
            }
        }
        Ok(g)
    }

    pub fn add_node(&mut self, v: &str) -> Result<NodeIx> {
        if self.nodes.contains_key(v) {
            return Err(RenumberError::DuplicateNode(v.to_string()));
        }
        let v_arc = arc_str(v);
        let (ix, _) = self.nodes.insert_full(v_arc.clone(), GraphNode::new(v_arc));
        Ok(ix)
    }

    /// Add `source -> dest`. Links to or from unknown nodes, and self links,
    /// are dropped and counted instead of failing.
    pub fn add_link(&mut self, source: &str, dest: &str) -> bool {
        match (self.index_of(source), self.index_of(dest)) {
            (Some(s), Some(d)) if s != d => {
                self.add_link_ix(s, d);
                true
            }
            _ => {
                self.dropped_links += 1;
                false
            }
        }
    }

    fn add_link_ix(&mut self, s: NodeIx, d: NodeIx) {
        self.links.push(Link { source: s, dest: d });
        if let Some((_, node)) = self.nodes.get_index_mut(s) {
            node.successors.push(d);
            node.neighbors.push(d);
        }
        if let Some((_, node)) = self.nodes.get_index_mut(d) {
            node.predecessors.push(s);
            node.neighbors.push(s);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn dropped_links(&self) -> usize {
        self.dropped_links
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn index_of(&self, v: &str) -> Option<NodeIx> {
        self.nodes.get_index_of(v)
    }

    /// Original identifier of a node index. Panics on an index from another graph.
    pub fn id(&self, ix: NodeIx) -> &str {
        match self.nodes.get_index(ix) {
            Some((k, _)) => k.as_ref(),
            None => panic!("node index {} out of bounds ({} nodes)", ix, self.nodes.len()),
        }
    }

    pub fn node(&self, ix: NodeIx) -> Option<&GraphNode> {
        self.nodes.get_index(ix).map(|(_, node)| node)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.keys().map(|k| k.as_ref())
    }

    pub fn successors(&self, ix: NodeIx) -> &[NodeIx] {
        self.node(ix).map(|n| n.successors.as_slice()).unwrap_or(&[])
    }

    pub fn predecessors(&self, ix: NodeIx) -> &[NodeIx] {
        self.node(ix).map(|n| n.predecessors.as_slice()).unwrap_or(&[])
    }

    /// Both directions, with multiplicity.
    pub fn neighbors(&self, ix: NodeIx) -> &[NodeIx] {
        self.node(ix).map(|n| n.neighbors.as_slice()).unwrap_or(&[])
    }

    /// Undirected projection restricted to `subset`: each linked pair once,
    /// as `(low, high)` node indices, in link order.
    pub fn undirected_edges(&self, subset: &[NodeIx]) -> Vec<(NodeIx, NodeIx)> {
        let members: HashSet<NodeIx> = subset.iter().copied().collect();
        let mut seen = HashSet::with_capacity(self.links.len());
        let mut edges = Vec::new();
        for link in &self.links {
            if !members.contains(&link.source) || !members.contains(&link.dest) {
                continue;
            }
            let pair = if link.source < link.dest {
                (link.source, link.dest)
            } else {
                (link.dest, link.source)
            };
            if seen.insert(pair) {
                edges.push(pair);
            }
        }
        edges
    }
}
