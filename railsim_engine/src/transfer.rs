//! `TransferMgr` (spec.md §4.8): resolves the `nextEdge` a vehicle takes
//! once its current edge runs out, from its path buffer, a precomputed
//! loop sequence, or a uniform random pick.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use railsim_common::consts::INVALID_INDEX;
use railsim_common::graph::Edge;
use railsim_common::vehicle::{NextEdgeState, TransferMode};

use crate::store::EngineStore;

/// Owns the transfer FIFO, the precomputed LOOP sequences, and the RNG used
/// for `RANDOM` mode. Loop sequences and the FIFO are fab-local (spec.md §5:
/// "never cross workers").
pub struct TransferMgr {
    queue: VecDeque<u32>,
    queued: std::collections::HashSet<u32>,
    /// `vehicle_id -> [edge_idx, ...]`, each vehicle's canonical
    /// follow-`nextEdgeIndices[0]` cycle (§4.9), built once at fab init.
    loop_map: HashMap<u32, Vec<u32>>,
    rng: StdRng,
}

impl TransferMgr {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            queued: std::collections::HashSet::new(),
            loop_map: HashMap::new(),
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Deterministic variant for tests/reproducible runs (spec.md §8
    /// round-trip property: identical configs + seed produce identical
    /// bitwise buffer contents).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: std::collections::HashSet::new(),
            loop_map: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set_loop_map(&mut self, loop_map: HashMap<u32, Vec<u32>>) {
        self.loop_map = loop_map;
    }

    /// Enqueue `veh_id` for a `nextEdge` decision. No-op if already queued.
    pub fn enqueue_vehicle_transfer(&mut self, veh_id: u32) {
        if self.queued.insert(veh_id) {
            self.queue.push_back(veh_id);
        }
    }

    /// Resolve one vehicle's next edge: path buffer first, then
    /// `transfer_mode`'s fallback. Returns `None` if no edge could be
    /// determined (dead end; `nextEdgeState` stays `PENDING`).
    fn resolve_next_edge(&mut self, store: &mut EngineStore, edges: &[Edge], veh_id: u32, mode: TransferMode) -> Option<u32> {
        if let Some(next) = store.pop_path_front(veh_id) {
            return Some(next);
        }
        match mode {
            TransferMode::Loop => {
                let current = store.current_edge(veh_id);
                let seq = self.loop_map.get(&veh_id)?;
                let pos = seq.iter().position(|&e| e == current)?;
                Some(seq[(pos + 1) % seq.len()])
            }
            TransferMode::Random => {
                let current = store.current_edge(veh_id);
                let candidates = &edges.get(current as usize - 1)?.next_edge_indices;
                if candidates.is_empty() {
                    return None;
                }
                let pick = self.rng.gen_range(0..candidates.len());
                Some(candidates[pick])
            }
        }
    }

    /// Drains the transfer queue, writing `nextEdge`/`nextEdgeState` for
    /// every vehicle that resolves to a valid edge. Vehicles that can't be
    /// resolved this pass stay `PENDING` and are not re-queued (the next
    /// §4.6 step-5 trigger only fires again once `nextEdgeState` returns to
    /// `EMPTY`, i.e. after a future transition).
    pub fn process_transfer_queue(&mut self, store: &mut EngineStore, edges: &[Edge], mode: TransferMode) {
        while let Some(veh_id) = self.queue.pop_front() {
            self.queued.remove(&veh_id);
            if !store.is_active(veh_id) {
                continue;
            }
            match self.resolve_next_edge(store, edges, veh_id, mode) {
                Some(next_edge) if next_edge != INVALID_INDEX => {
                    store.set_next_edge(veh_id, next_edge);
                    store.set_next_edge_state(veh_id, NextEdgeState::Ready);
                }
                _ => {
                    tracing::warn!(vehicle = veh_id, "transfer queue could not resolve a next edge");
                }
            }
        }
    }

    /// Command-driven override (spec.md §4.8 `DispatchMgr` → `assignCommand`):
    /// force `veh_id`'s path buffer to route toward `target_edge_name`
    /// resolved through `edge_name_to_index`. Unknown names are a no-op; the
    /// caller (`DispatchMgr`) logs the drop.
    pub fn assign_command(
        &mut self,
        store: &mut EngineStore,
        edges: &[Edge],
        edge_name_to_index: &std::collections::HashMap<String, u32>,
        veh_id: u32,
        target_edge_name: &str,
    ) -> bool {
        let Some(&target_idx) = edge_name_to_index.get(target_edge_name) else { return false };
        if edges.get(target_idx as usize - 1).is_none() {
            return false;
        }
        store.set_path(veh_id, &[target_idx]);
        true
    }
}

impl Default for TransferMgr {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds each vehicle's canonical loop sequence: repeatedly follow
/// `nextEdgeIndices[0]` from the vehicle's starting edge, up to 100 hops,
/// stopping on revisit (spec.md §4.9).
pub fn build_loop_map(edges: &[Edge], starting_edges: &[(u32, u32)]) -> HashMap<u32, Vec<u32>> {
    const MAX_HOPS: usize = 100;
    let mut map = HashMap::new();
    for &(veh_id, start_edge) in starting_edges {
        let mut seq = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = start_edge;
        for _ in 0..MAX_HOPS {
            if !seen.insert(current) {
                break;
            }
            seq.push(current);
            let Some(edge) = edges.get(current as usize - 1) else { break };
            let Some(&next) = edge.next_edge_indices.first() else { break };
            current = next;
        }
        map.insert(veh_id, seq);
    }
    map
}
