//! One-shot deadlock-zone detection (spec.md §4.10), run once at fab init
//! after [`crate::topology::compute_topology`].
//!
//! A deadlock zone is a diamond: two diverge nodes `{A, D}` whose outgoing
//! reachable-in-one-hop sets intersect in *exactly two* merge nodes
//! `{B, C}`. New graph-algorithm code — no teacher analog exists for this
//! domain, built directly from spec.md.

use railsim_common::graph::node::DeadlockNodeRole;
use railsim_common::graph::{Edge, Node};
use std::collections::{HashMap, HashSet};

/// Scan every pair of diverge nodes for a two-branch/two-merge diamond and
/// tag the four nodes plus the edges that participate in each zone found.
/// `deadlock_zone_id`s are assigned in the order zones are discovered.
pub fn detect_deadlock_zones(nodes: &mut [Node], edges: &mut [Edge]) {
    let diverge_indices: Vec<u32> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.is_diverge)
        .map(|(i, _)| (i + 1) as u32)
        .collect();

    // out_targets[node] = set of nodes directly reachable via one outgoing edge.
    let mut out_targets: HashMap<u32, HashSet<u32>> = HashMap::new();
    for edge in edges.iter() {
        out_targets.entry(edge.from_node).or_default().insert(edge.to_node);
    }

    let mut next_zone_id = 0u32;
    for i in 0..diverge_indices.len() {
        for j in (i + 1)..diverge_indices.len() {
            let a = diverge_indices[i];
            let d = diverge_indices[j];
            let empty = HashSet::new();
            let targets_a = out_targets.get(&a).unwrap_or(&empty);
            let targets_d = out_targets.get(&d).unwrap_or(&empty);

            let shared_merges: Vec<u32> = targets_a
                .intersection(targets_d)
                .copied()
                .filter(|&n| nodes[n as usize - 1].is_merge)
                .collect();

            if shared_merges.len() != 2 {
                continue;
            }

            let zone_id = next_zone_id;
            next_zone_id += 1;

            nodes[a as usize - 1].deadlock_role = Some(DeadlockNodeRole::Branch);
            nodes[a as usize - 1].deadlock_zone_id = Some(zone_id);
            nodes[d as usize - 1].deadlock_role = Some(DeadlockNodeRole::Branch);
            nodes[d as usize - 1].deadlock_zone_id = Some(zone_id);
            for &m in &shared_merges {
                nodes[m as usize - 1].deadlock_role = Some(DeadlockNodeRole::Merge);
                nodes[m as usize - 1].deadlock_zone_id = Some(zone_id);
            }

            let branches: HashSet<u32> = [a, d].into_iter().collect();
            let merges: HashSet<u32> = shared_merges.into_iter().collect();
            for edge in edges.iter_mut() {
                if branches.contains(&edge.from_node) && merges.contains(&edge.to_node) {
                    edge.is_deadlock_zone_inside = true;
                    edge.deadlock_zone_id = Some(zone_id);
                }
            }
            for edge in edges.iter_mut() {
                if branches.contains(&edge.to_node) && !merges.contains(&edge.from_node) {
                    edge.is_deadlock_zone_entry = true;
                    edge.deadlock_zone_id = Some(zone_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railsim_common::graph::edge::{Axis, EdgeKind, RenderPoint};
    use railsim_common::graph::Node;

    fn node(name: &str) -> Node {
        Node::new(name, 0.0, 0.0, 0.0)
    }

    fn edge(name: &str, from: u32, to: u32) -> Edge {
        Edge {
            name: name.into(),
            from_node: from,
            to_node: to,
            waypoints: vec![],
            kind: EdgeKind::Linear,
            distance: 1.0,
            radius: None,
            rotation: None,
            axis: Axis::X,
            rendering_points: vec![
                RenderPoint { x: 0.0, y: 0.0, z: 0.0 },
                RenderPoint { x: 1.0, y: 0.0, z: 0.0 },
            ],
            from_node_is_merge: false,
            from_node_is_diverge: false,
            to_node_is_merge: false,
            to_node_is_diverge: false,
            next_edge_indices: vec![],
            prev_edge_indices: vec![],
            is_deadlock_zone_inside: false,
            is_deadlock_zone_entry: false,
            deadlock_zone_id: None,
        }
    }

    /// Diamond: entry -> A -> {B, C} -> D (A, D diverge; B, C merge).
    fn diamond() -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = vec![node("ENTRY"), node("A"), node("B"), node("C"), node("D")];
        let mut edges = vec![
            edge("E_entry", 1, 2),
            edge("E_ab", 2, 3),
            edge("E_ac", 2, 4),
            edge("E_bd", 3, 5),
            edge("E_cd", 4, 5),
        ];
        crate::topology::compute_topology(&mut nodes, &mut edges);
        (nodes, edges)
    }

    #[test]
    fn detects_diamond_and_tags_all_four_nodes() {
        let (mut nodes, mut edges) = diamond();
        detect_deadlock_zones(&mut nodes, &mut edges);
        assert!(nodes[1].is_deadlock_branch_node()); // A
        assert!(nodes[4].is_deadlock_branch_node()); // D
        assert!(nodes[2].is_deadlock_merge_node()); // B
        assert!(nodes[3].is_deadlock_merge_node()); // C
        let ids: HashSet<_> = [1usize, 2, 3, 4].iter().map(|&i| nodes[i].deadlock_zone_id).collect();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn tags_inside_and_entry_edges() {
        let (mut nodes, mut edges) = diamond();
        detect_deadlock_zones(&mut nodes, &mut edges);
        assert!(edges[1].is_deadlock_zone_inside); // A->B
        assert!(edges[2].is_deadlock_zone_inside); // A->C
        assert!(edges[0].is_deadlock_zone_entry); // entry->A
    }

    #[test]
    fn no_false_positive_on_plain_chain() {
        let mut nodes = vec![node("A"), node("B"), node("C")];
        let mut edges = vec![edge("E1", 1, 2), edge("E2", 2, 3)];
        crate::topology::compute_topology(&mut nodes, &mut edges);
        detect_deadlock_zones(&mut nodes, &mut edges);
        assert!(nodes.iter().all(|n| n.deadlock_zone_id.is_none()));
    }
}
