//! Breadth-limited subgraph export for external visualization

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;
use vigil_core::NodeId;

use crate::graph::RelationshipGraph;

/// One undirected edge of an exported subgraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubgraphEdge {
    pub a: NodeId,
    pub b: NodeId,
    pub weight: u64,
}

/// `{nodes, edges}` view of the neighborhood around a seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubgraphExport {
    /// Sorted node set
    pub nodes: Vec<NodeId>,
    /// Edges between exported nodes, `a <= b`, sorted
    pub edges: Vec<SubgraphEdge>,
}

impl RelationshipGraph {
    /// Export the nodes within `depth` hops of `seed`, stopping once
    /// `max_nodes` nodes have been collected.
    pub fn export_subgraph(&self, seed: &NodeId, depth: usize, max_nodes: usize) -> SubgraphExport {
        let mut nodes: BTreeSet<NodeId> = BTreeSet::from([seed.clone()]);
        let mut frontier: Vec<NodeId> = vec![seed.clone()];

        'hops: for _ in 0..depth {
            let mut next = Vec::new();
            for node in &frontier {
                let Some(adj) = self.adjacent(node) else {
                    continue;
                };
                // Sorted so truncation at max_nodes is reproducible
                let mut neighbors: Vec<&NodeId> = adj.keys().collect();
                neighbors.sort();
                for neighbor in neighbors {
                    if nodes.len() >= max_nodes {
                        break 'hops;
                    }
                    if nodes.insert(neighbor.clone()) {
                        next.push(neighbor.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut edges: Vec<SubgraphEdge> = self
            .edges()
            .filter(|(a, b, _)| nodes.contains(*a) && nodes.contains(*b))
            .map(|(a, b, weight)| SubgraphEdge {
                a: a.clone(),
                b: b.clone(),
                weight,
            })
            .collect();
        edges.sort_by(|x, y| x.a.cmp(&y.a).then_with(|| x.b.cmp(&y.b)));

        SubgraphExport {
            nodes: nodes.into_iter().collect(),
            edges,
        }
    }
}

impl SubgraphExport {
    /// Render as a Graphviz DOT document, instruments drawn as boxes
    pub fn to_dot(&self, min_weight: u64) -> String {
        let mut out = String::from("graph G {\n  overlap=false;\n  splines=true;\n");
        for node in &self.nodes {
            let shape = if node.is_instrument() {
                "box,fontcolor=gray"
            } else {
                "ellipse"
            };
            let _ = writeln!(out, "  \"{}\" [shape={}];", node, shape);
        }
        for edge in self.edges.iter().filter(|e| e.weight >= min_weight) {
            let _ = writeln!(
                out,
                "  \"{}\" -- \"{}\" [label=\"{}\"];",
                edge.a, edge.b, edge.weight
            );
        }
        out.push('}');
        out
    }
}
