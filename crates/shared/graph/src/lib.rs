//! Vigil Relationship Graph
//!
//! Undirected weighted multigraph over accounts and instruments.
//!
//! ```text
//!   ACC-A ──3── ACC-B          trade counterparties
//!     │           │
//!     2           2            order / trade ↔ instrument
//!     │           │
//!   INST::XYZ ────┘
//! ```
//!
//! Edge weight is the number of co-occurrences. Every recorded edge has
//! weight ≥ 1, so traversal never has to skip an edge.

mod export;
mod graph;

pub use export::{SubgraphEdge, SubgraphExport};
pub use graph::RelationshipGraph;
