//! Rail-graph node: a named point in space plus derived topology.

use serde::{Deserialize, Serialize};

/// A node's role within a detected deadlock zone (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadlockNodeRole {
    /// One of the two diverge nodes of a deadlock diamond.
    Branch,
    /// One of the two merge nodes of a deadlock diamond.
    Merge,
}

/// A rail-graph node: `{name, x, y, z, barcode}` plus derived topology.
///
/// `is_merge`/`is_diverge`/`is_terminal` and the deadlock classification are
/// recomputed by [`crate::graph::Node::recompute_degree_flags`] /
/// `railsim_engine`'s deadlock-zone detector whenever the edge set changes —
/// they are never hand-set and never drift from the edge set they describe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub barcode: Option<String>,

    /// Number of edges whose `to_node` is this node.
    #[serde(default)]
    pub in_degree: u32,
    /// Number of edges whose `from_node` is this node.
    #[serde(default)]
    pub out_degree: u32,

    /// `in_degree >= 2`.
    #[serde(default)]
    pub is_merge: bool,
    /// `out_degree >= 2`.
    #[serde(default)]
    pub is_diverge: bool,
    /// No outgoing edges.
    #[serde(default)]
    pub is_terminal: bool,

    /// Set by deadlock-zone detection (§4.10); `None` outside any zone.
    #[serde(default)]
    pub deadlock_role: Option<DeadlockNodeRole>,
    #[serde(default)]
    pub deadlock_zone_id: Option<u32>,
}

impl Node {
    pub fn new(name: impl Into<String>, x: f32, y: f32, z: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            z,
            barcode: None,
            in_degree: 0,
            out_degree: 0,
            is_merge: false,
            is_diverge: false,
            is_terminal: false,
            deadlock_role: None,
            deadlock_zone_id: None,
        }
    }

    /// Recompute `is_merge`/`is_diverge`/`is_terminal` from degree counts.
    /// Called once per node after `in_degree`/`out_degree` are tallied from
    /// the full edge set.
    pub fn recompute_degree_flags(&mut self) {
        self.is_merge = self.in_degree >= 2;
        self.is_diverge = self.out_degree >= 2;
        self.is_terminal = self.out_degree == 0;
    }

    pub fn is_deadlock_branch_node(&self) -> bool {
        matches!(self.deadlock_role, Some(DeadlockNodeRole::Branch))
    }

    pub fn is_deadlock_merge_node(&self) -> bool {
        matches!(self.deadlock_role, Some(DeadlockNodeRole::Merge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_flags_recompute_correctly() {
        let mut n = Node::new("N1", 0.0, 0.0, 0.0);
        n.in_degree = 2;
        n.out_degree = 1;
        n.recompute_degree_flags();
        assert!(n.is_merge);
        assert!(!n.is_diverge);
        assert!(!n.is_terminal);
    }

    #[test]
    fn terminal_node_has_no_outgoing_edges() {
        let mut n = Node::new("END", 0.0, 0.0, 0.0);
        n.out_degree = 0;
        n.recompute_degree_flags();
        assert!(n.is_terminal);
    }
}
