//! Edge-transition state machine (spec.md §4.7): consumes ratio overflow,
//! possibly across several short edges in one tick, and reports
//! topologically unusual moves without ever halting the tick.

use railsim_common::consts::INVALID_INDEX;
use railsim_common::graph::Edge;
use railsim_common::vehicle::{NextEdgeState, StopReason, TrafficState};

use crate::lock::LockMgr;
use crate::movement::select_preset_idx;
use crate::store::EngineStore;

/// A transition where `prev.to_node != next.from_node`: the engine trusts
/// `nextEdge` and moves the vehicle anyway (spec.md §7), but the caller is
/// notified so it can decide whether to keep running.
#[derive(Debug, Clone, Copy)]
pub struct UnusualMoveEvent {
    pub vehicle_index: u32,
    pub prev_edge_idx: u32,
    pub next_edge_idx: u32,
    pub x: f32,
    pub y: f32,
}

/// Drains ratio `>= 1` for `veh_id`, hopping across edges until `nextEdge`
/// isn't `READY` or the overflow no longer carries past the next edge's end.
/// Returns whether `currentEdge` actually changed (callers use this to
/// decide whether a merge-node lock needs releasing).
pub fn apply_edge_transition(
    store: &mut EngineStore,
    edges: &[Edge],
    lock: &mut LockMgr,
    preset_count: u32,
    veh_id: u32,
    events: &mut Vec<UnusualMoveEvent>,
) -> bool {
    let mut transitioned = false;

    loop {
        if store.edge_ratio(veh_id) < 1.0 {
            break;
        }
        let state = store.next_edge_state(veh_id);
        let next_edge_idx = store.next_edge(veh_id);
        if state != NextEdgeState::Ready || next_edge_idx == INVALID_INDEX {
            store.set_edge_ratio(veh_id, 1.0);
            break;
        }

        let current_edge_idx = store.current_edge(veh_id);
        let Some(current_edge) = edges.get(current_edge_idx as usize - 1) else {
            store.set_edge_ratio(veh_id, 1.0);
            break;
        };
        let Some(next_edge) = edges.get(next_edge_idx as usize - 1) else {
            tracing::warn!(vehicle = veh_id, next_edge_idx, "transition target edge missing");
            store.set_edge_ratio(veh_id, 1.0);
            break;
        };

        let overflow_dist = (store.edge_ratio(veh_id) - 1.0) * current_edge.distance;

        if current_edge.to_node != next_edge.from_node {
            let (x, y, _z) = store.position(veh_id);
            events.push(UnusualMoveEvent {
                vehicle_index: veh_id,
                prev_edge_idx: current_edge_idx,
                next_edge_idx,
                x,
                y,
            });
        }

        let new_ratio = overflow_dist / next_edge.distance;
        if store.move_vehicle_to_edge(veh_id, next_edge_idx, new_ratio).is_err() {
            tracing::warn!(vehicle = veh_id, next_edge_idx, "failed to move vehicle onto transition target");
            store.set_edge_ratio(veh_id, 1.0);
            break;
        }
        store.set_preset_idx(veh_id, select_preset_idx(next_edge, preset_count));
        let sr = store.stop_reason(veh_id);
        store.set_stop_reason(veh_id, sr - StopReason::LOCKED);
        store.set_next_edge_state(veh_id, NextEdgeState::Empty);
        store.set_next_edge(veh_id, INVALID_INDEX);

        if current_edge.to_node_is_merge {
            lock.release_lock(current_edge.to_node, veh_id);
            store.set_traffic_state(veh_id, TrafficState::Free);
        }

        transitioned = true;

        if new_ratio < 1.0 {
            break;
        }
    }

    transitioned
}
