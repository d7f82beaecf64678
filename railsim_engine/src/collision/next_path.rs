//! Next-path collision (spec.md §4.4 step 3): an edge's lead vehicle checked
//! against oncoming traffic reachable through `nextEdgeIndices`.

use std::collections::{HashSet, VecDeque};

use railsim_common::consts::SHORT_EDGE_LOOKTHROUGH_M;
use railsim_common::graph::edge::EdgeKind;
use railsim_common::graph::Edge;
use railsim_common::vehicle::HitZone;

use super::CollisionAccumulator;
use crate::sensor::SensorStore;
use crate::store::EngineStore;

/// A short, empty `Linear` edge is transparent: BFS keeps expanding through
/// it regardless of whether it is occupied, since its own length is too
/// short to give a lead vehicle meaningful stopping room.
fn is_lookthrough(edge: &Edge) -> bool {
    edge.kind == EdgeKind::Linear && edge.distance < SHORT_EDGE_LOOKTHROUGH_M
}

/// For every edge with a lead vehicle, BFS forward over `next_edge_indices`
/// looking for the nearest oncoming vehicle on each reachable branch (its
/// `tail()`, i.e. the vehicle closest to entering from this edge). Stops
/// expanding a branch once it finds an occupied, non-look-through edge, or
/// once a `STOP` zone is recorded for the lead vehicle.
pub fn check_next_path_collisions(
    store: &EngineStore,
    sensors: &SensorStore,
    edges: &[Edge],
    acc: &mut CollisionAccumulator,
) {
    for (edge_idx_zero, edge) in edges.iter().enumerate() {
        let edge_idx = edge_idx_zero as u32 + 1;
        let Some(queue) = store.queue(edge_idx) else { continue };
        let Some(lead) = queue.lead() else { continue };

        let mut visited: HashSet<u32> = HashSet::new();
        visited.insert(edge_idx);
        let mut frontier: VecDeque<u32> = edge.next_edge_indices.iter().copied().collect();

        'bfs: while let Some(candidate_idx) = frontier.pop_front() {
            if !visited.insert(candidate_idx) {
                continue;
            }
            let Some(candidate) = edges.get(candidate_idx as usize - 1) else { continue };
            let Some(candidate_queue) = store.queue(candidate_idx) else { continue };

            if let Some(target) = candidate_queue.tail() {
                let zone = sensors.check_sensor_collision(lead, target);
                acc.record(lead, zone, target);
                if zone == Some(HitZone::Stop) {
                    break 'bfs;
                }
            }

            if is_lookthrough(candidate) {
                frontier.extend(candidate.next_edge_indices.iter().copied());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railsim_common::consts::{MAX_PATH_LENGTH, SENSOR_DATA_SIZE, VEHICLE_DATA_SIZE};
    use railsim_common::graph::edge::{Axis, RenderPoint};
    use railsim_common::sensor::{BodyPreset, SensorPreset, ZonePreset};
    use railsim_common::vehicle::MovingStatus;
    use railsim_memory::SharedRegion;

    fn preset() -> SensorPreset {
        SensorPreset {
            name_index: 0,
            zones: [
                ZonePreset { left_length: 3.0, right_length: 3.0, side_width: 0.5, dec: -0.5 },
                ZonePreset { left_length: 2.0, right_length: 2.0, side_width: 0.5, dec: -1.0 },
                ZonePreset { left_length: 1.0, right_length: 1.0, side_width: 0.5, dec: f32::NEG_INFINITY },
            ],
            body: BodyPreset { length: 1.0, width: 0.8 },
        }
    }

    fn make_edge(name: &str, from: u32, to: u32, dist: f32, next: Vec<u32>) -> Edge {
        Edge {
            name: name.into(),
            from_node: from,
            to_node: to,
            waypoints: vec![],
            kind: EdgeKind::Linear,
            distance: dist,
            radius: None,
            rotation: None,
            axis: Axis::X,
            rendering_points: vec![
                RenderPoint { x: 0.0, y: 0.0, z: 0.0 },
                RenderPoint { x: dist, y: 0.0, z: 0.0 },
            ],
            from_node_is_merge: false,
            from_node_is_diverge: false,
            to_node_is_merge: false,
            to_node_is_diverge: false,
            next_edge_indices: next,
            prev_edge_indices: vec![],
            is_deadlock_zone_inside: false,
            is_deadlock_zone_entry: false,
            deadlock_zone_id: None,
        }
    }

    fn store_with(edges: usize, vehicles: &[(u32, f32, u32)]) -> (EngineStore, SensorStore, Vec<SensorPreset>) {
        let mut store = EngineStore::new(
            SharedRegion::new(4 * VEHICLE_DATA_SIZE * 4).unwrap(),
            SharedRegion::new(4 * (MAX_PATH_LENGTH + 1) * 4).unwrap(),
            4,
            edges as u32,
        );
        for &(veh, x, edge_idx) in vehicles {
            store
                .add_vehicle(veh, crate::store::VehicleInit {
                    x, y: 0.0, z: 0.0, edge_index: edge_idx, edge_ratio: 0.5, rotation: 0.0,
                    velocity: 0.0, acceleration: 0.0, deceleration: 0.0, moving_status: MovingStatus::Moving,
                })
                .unwrap();
        }
        let mut sensors = SensorStore::new(SharedRegion::new(4 * SENSOR_DATA_SIZE * 4).unwrap());
        let preset = preset();
        for &(veh, x, _) in vehicles {
            sensors.update_sensor_points(veh, x, 0.0, 0.0, &preset);
        }
        (store, sensors, vec![preset])
    }

    #[test]
    fn lead_vehicle_detects_oncoming_on_next_edge() {
        let edges = vec![
            make_edge("E1", 1, 2, 10.0, vec![2]),
            make_edge("E2", 2, 3, 10.0, vec![]),
        ];
        let (store, sensors, _) = store_with(2, &[(0, 9.5, 1), (1, 10.2, 2)]);
        let mut acc = CollisionAccumulator::default();
        check_next_path_collisions(&store, &sensors, &edges, &mut acc);
        assert!(acc.into_inner().contains_key(&0));
    }

    #[test]
    fn empty_branch_with_no_vehicles_records_nothing() {
        let edges = vec![
            make_edge("E1", 1, 2, 10.0, vec![2]),
            make_edge("E2", 2, 3, 10.0, vec![]),
        ];
        let (store, sensors, _) = store_with(2, &[(0, 9.5, 1)]);
        let mut acc = CollisionAccumulator::default();
        check_next_path_collisions(&store, &sensors, &edges, &mut acc);
        assert!(acc.into_inner().is_empty());
    }

    #[test]
    fn bfs_looks_through_short_empty_edge_to_reach_next_occupant() {
        let edges = vec![
            make_edge("E1", 1, 2, 10.0, vec![2]),
            make_edge("SHORT", 2, 3, 1.0, vec![3]), // below SHORT_EDGE_LOOKTHROUGH_M, empty
            make_edge("E3", 3, 4, 10.0, vec![]),
        ];
        let (store, sensors, _) = store_with(3, &[(0, 9.5, 1), (1, 0.5, 3)]);
        let mut acc = CollisionAccumulator::default();
        check_next_path_collisions(&store, &sensors, &edges, &mut acc);
        assert!(acc.into_inner().contains_key(&0));
    }

    #[test]
    fn bfs_stops_at_long_empty_edge_and_does_not_reach_farther_occupant() {
        let edges = vec![
            make_edge("E1", 1, 2, 10.0, vec![2]),
            make_edge("LONG", 2, 3, 10.0, vec![3]), // at/above SHORT_EDGE_LOOKTHROUGH_M, empty
            make_edge("E3", 3, 4, 10.0, vec![]),
        ];
        let (store, sensors, _) = store_with(3, &[(0, 9.5, 1), (1, 0.5, 3)]);
        let mut acc = CollisionAccumulator::default();
        check_next_path_collisions(&store, &sensors, &edges, &mut acc);
        assert!(acc.into_inner().is_empty());
    }
}
