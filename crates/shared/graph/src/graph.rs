use std::collections::{HashMap, HashSet};
use vigil_core::NodeId;

/// Adjacency-map graph with a canonical pair counter
///
/// `adjacency[a][b]` and `adjacency[b][a]` always hold the same weight.
/// A self-edge is stored once, under `adjacency[a][a]`.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    adjacency: HashMap<NodeId, HashMap<NodeId, u64>>,
    /// Multiplicity per unordered pair, keyed with the smaller node first
    edge_counts: HashMap<(NodeId, NodeId), u64>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `weight` co-occurrences between `a` and `b`.
    ///
    /// No-op when either endpoint is empty or the weight is zero.
    pub fn add_edge(&mut self, a: &NodeId, b: &NodeId, weight: u64) {
        if a.is_empty() || b.is_empty() || weight == 0 {
            return;
        }

        if a == b {
            *self
                .adjacency
                .entry(a.clone())
                .or_default()
                .entry(b.clone())
                .or_insert(0) += weight;
        } else {
            *self
                .adjacency
                .entry(a.clone())
                .or_default()
                .entry(b.clone())
                .or_insert(0) += weight;
            *self
                .adjacency
                .entry(b.clone())
                .or_default()
                .entry(a.clone())
                .or_insert(0) += weight;
        }

        *self.edge_counts.entry(canonical(a, b)).or_insert(0) += weight;
    }

    /// Adjacent nodes; empty for unknown nodes
    pub fn neighbors(&self, node: &NodeId) -> HashSet<&NodeId> {
        self.adjacency
            .get(node)
            .map(|adj| adj.keys().collect())
            .unwrap_or_default()
    }

    /// Sum of incident edge weights, self-edges counted once
    pub fn degree(&self, node: &NodeId) -> u64 {
        self.adjacency
            .get(node)
            .map(|adj| adj.values().sum())
            .unwrap_or(0)
    }

    /// Weight of the edge between `a` and `b`, 0 if absent
    pub fn edge_weight(&self, a: &NodeId, b: &NodeId) -> u64 {
        self.edge_counts.get(&canonical(a, b)).copied().unwrap_or(0)
    }

    /// Every node reachable from `seed`, instruments included.
    ///
    /// An unknown seed yields the singleton `{seed}`.
    pub fn connected_component(&self, seed: &NodeId) -> HashSet<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<&NodeId> = vec![seed];

        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(adj) = self.adjacency.get(current) {
                stack.extend(adj.keys().filter(|nb| !seen.contains(*nb)));
            }
        }

        seen
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.adjacency.contains_key(node)
    }

    /// All nodes with at least one edge
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.adjacency.keys()
    }

    /// Account nodes only
    pub fn account_nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().filter_map(NodeId::as_account)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of distinct unordered pairs, self-edges included
    pub fn edge_count(&self) -> usize {
        self.edge_counts.len()
    }

    /// Highest-degree nodes, degree descending then identifier ascending
    pub fn top_nodes(&self, n: usize, exclude_instruments: bool) -> Vec<(NodeId, u64)> {
        let mut ranked: Vec<(NodeId, u64)> = self
            .adjacency
            .keys()
            .filter(|node| !(exclude_instruments && node.is_instrument()))
            .map(|node| (node.clone(), self.degree(node)))
            .collect();

        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Iterate unordered pairs with their weights
    pub(crate) fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId, u64)> {
        self.edge_counts.iter().map(|((a, b), w)| (a, b, *w))
    }

    pub(crate) fn adjacent(&self, node: &NodeId) -> Option<&HashMap<NodeId, u64>> {
        self.adjacency.get(node)
    }
}

fn canonical(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}
