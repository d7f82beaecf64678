//! Merge-zone collision (spec.md §4.4 step 2): vehicles approaching a
//! shared merge node from competing incoming edges.

use railsim_common::consts::CURVE_TAIL_LENGTH_M;
use railsim_common::graph::Edge;
use railsim_common::sensor::SensorPreset;
use railsim_common::vehicle::HitZone;

use super::CollisionAccumulator;
use crate::sensor::SensorStore;
use crate::store::EngineStore;

/// Offset (meters) from `from_node` for vehicle `veh_id` on an edge of
/// length `distance`.
fn offset_from_start(store: &EngineStore, veh_id: u32, distance: f32) -> f32 {
    store.edge_ratio(veh_id) * distance
}

/// The danger-zone entry offset for an edge: curves are checked in full
/// (threshold 0); linear edges only check their final `dangerZoneLen`
/// stretch before the merge node.
fn danger_threshold(edge: &Edge, danger_zone_len: f32) -> f32 {
    if edge.kind.is_curve() {
        0.0
    } else {
        (edge.distance - danger_zone_len).max(0.0)
    }
}

/// Checks vehicles in `edge_idx`'s danger zone (its `to_node` must be a
/// merge point) against vehicles in the danger zone of every other edge
/// converging on the same node, recording the worst hit each competing
/// vehicle produces.
pub fn check_merge_zone_collision(
    store: &EngineStore,
    sensors: &SensorStore,
    edges: &[Edge],
    edge_idx: u32,
    presets: &[SensorPreset],
    acc: &mut CollisionAccumulator,
) {
    let edge = &edges[edge_idx as usize - 1];
    if !edge.to_node_is_merge {
        return;
    }
    let Some(queue) = store.queue(edge_idx) else { return };

    let competitor_edges: Vec<(u32, &Edge)> = edges
        .iter()
        .enumerate()
        .map(|(i, e)| ((i + 1) as u32, e))
        .filter(|&(i, e)| i != edge_idx && e.to_node == edge.to_node)
        .collect();
    if competitor_edges.is_empty() {
        return;
    }

    for self_veh in queue.iter() {
        let preset = &presets[store.preset_idx(self_veh) as usize];
        let danger_len = CURVE_TAIL_LENGTH_M + 2.0 * preset.body.length;
        if offset_from_start(store, self_veh, edge.distance) < danger_threshold(edge, danger_len) {
            continue;
        }

        'competitors: for &(comp_idx, comp_edge) in &competitor_edges {
            let Some(comp_queue) = store.queue(comp_idx) else { continue };
            for target_veh in comp_queue.iter() {
                let target_preset = &presets[store.preset_idx(target_veh) as usize];
                let target_danger_len = CURVE_TAIL_LENGTH_M + 2.0 * target_preset.body.length;
                if offset_from_start(store, target_veh, comp_edge.distance)
                    < danger_threshold(comp_edge, target_danger_len)
                {
                    continue;
                }
                let zone = sensors.check_sensor_collision(self_veh, target_veh);
                acc.record(self_veh, zone, target_veh);
                if zone == Some(HitZone::Stop) {
                    break 'competitors;
                }
            }
        }
    }
}
