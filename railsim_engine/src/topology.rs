//! Derived rail-graph topology (spec.md §3): node degree/merge/diverge
//! flags and each edge's `next_edge_indices`/`prev_edge_indices`. Recomputed
//! once from the full edge set whenever it changes — topology is immutable
//! after fab init (§3), so this runs exactly once, during
//! [`crate::config::FabMapConfig::build`].

use railsim_common::graph::{Edge, Node};

/// Tally in/out degree from the edge set, recompute each node's
/// `is_merge`/`is_diverge`/`is_terminal`, then fill in every edge's
/// `next_edge_indices` (edges leaving `to_node`), `prev_edge_indices` (edges
/// arriving at `from_node`), and endpoint merge/diverge flags.
///
/// `next_edge_indices[0]` is the canonical "next" edge the LOOP map builder
/// uses (§9 Open Question) — preserved here as plain edge-set order, since
/// no other ordering is specified.
pub fn compute_topology(nodes: &mut [Node], edges: &mut [Edge]) {
    for node in nodes.iter_mut() {
        node.in_degree = 0;
        node.out_degree = 0;
    }
    for edge in edges.iter() {
        if let Some(n) = nodes.get_mut(edge.from_node as usize - 1) {
            n.out_degree += 1;
        }
        if let Some(n) = nodes.get_mut(edge.to_node as usize - 1) {
            n.in_degree += 1;
        }
    }
    for node in nodes.iter_mut() {
        node.recompute_degree_flags();
    }

    for edge in edges.iter_mut() {
        edge.next_edge_indices.clear();
        edge.prev_edge_indices.clear();
    }
    for i in 0..edges.len() {
        let (from, to) = (edges[i].from_node, edges[i].to_node);
        let mut next = Vec::new();
        let mut prev = Vec::new();
        for (j, other) in edges.iter().enumerate() {
            if j == i {
                continue;
            }
            if other.from_node == to {
                next.push((j + 1) as u32);
            }
            if other.to_node == from {
                prev.push((j + 1) as u32);
            }
        }
        edges[i].next_edge_indices = next;
        edges[i].prev_edge_indices = prev;
    }

    for edge in edges.iter_mut() {
        let from = &nodes[edge.from_node as usize - 1];
        let to = &nodes[edge.to_node as usize - 1];
        edge.from_node_is_merge = from.is_merge;
        edge.from_node_is_diverge = from.is_diverge;
        edge.to_node_is_merge = to.is_merge;
        edge.to_node_is_diverge = to.is_diverge;
    }
}
