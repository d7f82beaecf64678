//! `AutoMgr` (spec.md §4.8): assigns a destination path to any vehicle
//! whose path buffer has run dry, via a pluggable station-pick policy.

use railsim_common::graph::Node;

use crate::store::EngineStore;

/// One dispatchable destination: a name plus the 1-based node index a
/// vehicle should be routed toward.
#[derive(Debug, Clone)]
pub struct Station {
    pub name: String,
    pub node_idx: u32,
}

/// Produces the next destination for a vehicle whose path is exhausted.
/// The core only requires *some* edge-index path out of this; how stations
/// are picked (round-robin, nearest, load-balanced, ...) is the host's
/// business.
pub trait StationPickPolicy {
    fn pick(&mut self, veh_id: u32, stations: &[Station]) -> Option<usize>;
}

/// Round-robin over the configured station list — the simplest policy that
/// satisfies the pluggability requirement without inventing unrequested
/// routing logic.
#[derive(Default)]
pub struct RoundRobinPolicy {
    next: usize,
}

impl StationPickPolicy for RoundRobinPolicy {
    fn pick(&mut self, _veh_id: u32, stations: &[Station]) -> Option<usize> {
        if stations.is_empty() {
            return None;
        }
        let idx = self.next % stations.len();
        self.next += 1;
        Some(idx)
    }
}

/// Owns the station list and the current pick policy; scans for
/// path-exhausted vehicles each tick and writes a path into their buffer.
pub struct AutoMgr {
    stations: Vec<Station>,
    policy: Box<dyn StationPickPolicy + Send>,
}

impl AutoMgr {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations, policy: Box::new(RoundRobinPolicy::default()) }
    }

    pub fn with_policy(stations: Vec<Station>, policy: Box<dyn StationPickPolicy + Send>) -> Self {
        Self { stations, policy }
    }

    /// Routes every active vehicle whose path buffer is empty toward a
    /// freshly picked station, via BFS over `nextEdgeIndices` from the
    /// vehicle's current edge to any edge whose `to_node` matches the
    /// station's node.
    pub fn assign_destinations(&mut self, store: &mut EngineStore, edges: &[railsim_common::graph::Edge], _nodes: &[Node]) {
        if self.stations.is_empty() {
            return;
        }
        let active: Vec<u32> = store.active_indices().collect();
        for veh_id in active {
            if !store.path(veh_id).is_empty() {
                continue;
            }
            let Some(station_idx) = self.policy.pick(veh_id, &self.stations) else { continue };
            let target_node = self.stations[station_idx].node_idx;
            let current_edge = store.current_edge(veh_id);
            if let Some(path) = route_to_node(edges, current_edge, target_node) {
                store.set_path(veh_id, &path);
            }
        }
    }
}

/// Breadth-first search over `nextEdgeIndices` for a path of edge indices
/// from `start_edge` to any edge whose `to_node == target_node`. Returns the
/// path excluding `start_edge` itself (the vehicle is already traversing
/// it); `None` if unreachable within the edge count.
fn route_to_node(edges: &[railsim_common::graph::Edge], start_edge: u32, target_node: u32) -> Option<Vec<u32>> {
    use std::collections::{HashMap, VecDeque};

    let mut visited = std::collections::HashSet::new();
    visited.insert(start_edge);
    let mut frontier: VecDeque<u32> = VecDeque::new();
    let mut came_from: HashMap<u32, u32> = HashMap::new();

    let start = edges.get(start_edge as usize - 1)?;
    if start.to_node == target_node {
        return Some(vec![]);
    }
    for &n in &start.next_edge_indices {
        if visited.insert(n) {
            came_from.insert(n, start_edge);
            frontier.push_back(n);
        }
    }

    while let Some(edge_idx) = frontier.pop_front() {
        let edge = edges.get(edge_idx as usize - 1)?;
        if edge.to_node == target_node {
            let mut path = vec![edge_idx];
            let mut cur = edge_idx;
            while let Some(&prev) = came_from.get(&cur) {
                if prev == start_edge {
                    break;
                }
                path.push(prev);
                cur = prev;
            }
            path.reverse();
            return Some(path);
        }
        for &n in &edge.next_edge_indices {
            if visited.insert(n) {
                came_from.insert(n, edge_idx);
                frontier.push_back(n);
            }
        }
    }
    None
}
