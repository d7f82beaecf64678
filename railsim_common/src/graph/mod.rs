//! Rail-graph data model: nodes, edges, and their derived topology flags.
//!
//! All indices into edge/node arrays are 1-based; `0` is the invalid
//! sentinel (see [`crate::consts::INVALID_INDEX`]). Topology is immutable
//! after fab init; derived flags (`is_merge`, `is_diverge`, deadlock-zone
//! tags) are computed once from the edge set and never mutated per-tick.

pub mod edge;
pub mod node;

pub use edge::{Edge, EdgeKind};
pub use node::Node;
