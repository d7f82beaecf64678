//! Per-vehicle movement integration (spec.md §4.6) and the lock-request
//! pass that precedes it in the per-tick pipeline (spec.md §5).
//!
//! Grounded on `evo_hal::drivers::simulation::physics::axis::AxisSimulator::
//! update_positioning`'s accel/decel-clamped speed integration, generalized
//! from a single linear axis to ratio-along-an-edge kinematics with curve
//! speed caps and a merge-lock gate.

use railsim_common::config::FabConfig;
use railsim_common::consts::INVALID_INDEX;
use railsim_common::graph::Edge;
use railsim_common::sensor::SensorPreset;
use railsim_common::vehicle::{HitZone, MovingStatus, NextEdgeState, StopReason, TrafficState};

use crate::lock::LockMgr;
use crate::sensor::SensorStore;
use crate::store::EngineStore;
use crate::transition::{apply_edge_transition, UnusualMoveEvent};
use crate::transfer::TransferMgr;

/// Chooses a sensor preset index for `edge`: curve edges use the second
/// configured preset (a wider/slower profile) when one exists, linear edges
/// always use preset 0. Resolves the "derive presetIdx from edge type/curve
/// direction" instruction in spec.md §4.6/§4.7 — no richer per-curve-variant
/// mapping is specified, so direction beyond linear/curve is not modeled.
pub fn select_preset_idx(edge: &Edge, preset_count: u32) -> u32 {
    if edge.kind.is_curve() && preset_count > 1 {
        1
    } else {
        0
    }
}

/// Top-level "lock update" pipeline step (spec.md §5), run once per tick
/// before movement integration: every active vehicle resting on a
/// merge-bound edge with `trafficState == FREE` requests a grant and moves
/// to `WAITING`.
pub fn update_lock_requests(store: &mut EngineStore, edges: &[Edge], lock: &mut LockMgr) {
    let active: Vec<u32> = store.active_indices().collect();
    for veh_id in active {
        if store.moving_status(veh_id) == MovingStatus::Paused {
            continue;
        }
        let edge_idx = store.current_edge(veh_id);
        let Some(edge) = edges.get(edge_idx as usize - 1) else { continue };
        if !edge.to_node_is_merge {
            continue;
        }
        if store.traffic_state(veh_id) == TrafficState::Free {
            lock.request_lock(edge.to_node, edge_idx, veh_id, edge.is_deadlock_zone_entry);
            store.set_traffic_state(veh_id, TrafficState::Waiting);
        }
    }
}

/// Merge-lock gate applied to the vehicle's resulting active edge after
/// transition (spec.md §4.6 step 7 / §4.5): clamps ratio and zeroes
/// velocity while waiting short of the grant line.
fn apply_merge_lock(store: &mut EngineStore, edges: &[Edge], lock: &LockMgr, fab_config: &FabConfig, veh_id: u32) {
    let edge_idx = store.current_edge(veh_id);
    let Some(edge) = edges.get(edge_idx as usize - 1) else { return };
    if !edge.to_node_is_merge {
        return;
    }
    if store.traffic_state(veh_id) != TrafficState::Waiting {
        return;
    }

    if lock.check_grant(edge.to_node, veh_id) {
        store.set_traffic_state(veh_id, TrafficState::Acquired);
        let sr = store.stop_reason(veh_id);
        store.set_stop_reason(veh_id, sr - StopReason::LOCKED);
        return;
    }

    let wait_dist = if edge.kind.is_curve() {
        fab_config.lock_wait_distance_curve
    } else {
        fab_config.lock_wait_distance_straight
    };
    let ratio = store.edge_ratio(veh_id);
    if ratio * edge.distance >= wait_dist {
        let sr = store.stop_reason(veh_id);
        store.set_stop_reason(veh_id, sr | StopReason::LOCKED);
        store.set_edge_ratio(veh_id, (wait_dist / edge.distance).min(1.0));
        store.set_velocity(veh_id, 0.0);
    } else {
        let sr = store.stop_reason(veh_id);
        store.set_stop_reason(veh_id, sr - StopReason::LOCKED);
    }
}

/// Runs the full §4.6 integration for one vehicle: sensor-stop latch,
/// accel/decel selection, speed/ratio update, transfer trigger, edge
/// transition, merge lock, pose and sensor rewrite. `PAUSED` vehicles are
/// entirely skipped; `STOPPED` vehicles are held at zero velocity with no
/// further processing.
#[allow(clippy::too_many_arguments)]
pub fn step_vehicle(
    store: &mut EngineStore,
    sensors: &mut SensorStore,
    edges: &[Edge],
    presets: &[SensorPreset],
    lock: &mut LockMgr,
    transfer: &mut TransferMgr,
    fab_config: &FabConfig,
    veh_id: u32,
    dt: f32,
    events: &mut Vec<UnusualMoveEvent>,
) {
    match store.moving_status(veh_id) {
        MovingStatus::Paused => return,
        MovingStatus::Stopped => {
            store.set_velocity(veh_id, 0.0);
            return;
        }
        MovingStatus::Moving => {}
    }

    // Step 1: sensor-stop latch.
    if store.hit_zone(veh_id) == Some(HitZone::Stop) {
        store.set_velocity(veh_id, 0.0);
        store.set_deceleration(veh_id, 0.0);
        let sr = store.stop_reason(veh_id);
        store.set_stop_reason(veh_id, sr | StopReason::SENSORED);
        return;
    }
    let sr = store.stop_reason(veh_id);
    store.set_stop_reason(veh_id, sr - StopReason::SENSORED);

    let current_edge_idx = store.current_edge(veh_id);
    let Some(current_edge) = edges.get(current_edge_idx as usize - 1) else { return };
    let is_curve = current_edge.kind.is_curve();
    let max_speed = if is_curve { fab_config.curve_max_speed } else { fab_config.linear_max_speed };

    // Step 2: accel/decel selection.
    let velocity = store.velocity(veh_id);
    let decel = store.deceleration(veh_id);
    let accel = if is_curve && velocity >= max_speed {
        0.0
    } else if store.hit_zone(veh_id).is_some() {
        0.0
    } else {
        store.acceleration(veh_id)
    };

    // Step 3: speed update.
    let next_velocity = if decel == f32::NEG_INFINITY {
        0.0
    } else {
        (velocity + (accel + decel) * dt).clamp(0.0, max_speed)
    };
    store.set_velocity(veh_id, next_velocity);

    // Step 4: ratio update.
    let next_ratio = store.edge_ratio(veh_id) + next_velocity * dt / current_edge.distance;
    store.set_edge_ratio(veh_id, next_ratio);

    // Step 5: transfer trigger.
    if store.next_edge_state(veh_id) == NextEdgeState::Empty {
        store.set_next_edge_state(veh_id, NextEdgeState::Pending);
        transfer.enqueue_vehicle_transfer(veh_id);
    }

    // Step 6: edge transition.
    apply_edge_transition(store, edges, lock, presets.len() as u32, veh_id, events);

    // Step 7: merge lock on the resulting active edge.
    apply_merge_lock(store, edges, lock, fab_config, veh_id);

    // Step 8: pose.
    let active_edge_idx = store.current_edge(veh_id);
    let Some(active_edge) = edges.get(active_edge_idx as usize - 1) else { return };
    if let Some((x, y, z, rotation)) = active_edge.interpolate(store.edge_ratio(veh_id)) {
        store.set_position(veh_id, x, y, z);
        store.set_rotation(veh_id, rotation);
    }

    // Step 9: sensors.
    let (x, y, _z) = store.position(veh_id);
    let rotation = store.rotation(veh_id);
    let preset_idx = store.preset_idx(veh_id) as usize;
    if let Some(preset) = presets.get(preset_idx) {
        sensors.update_sensor_points(veh_id, x, y, rotation, preset);
    }
}

/// Steps every active vehicle, returning the unusual-move events collected
/// across all of them.
#[allow(clippy::too_many_arguments)]
pub fn step_all(
    store: &mut EngineStore,
    sensors: &mut SensorStore,
    edges: &[Edge],
    presets: &[SensorPreset],
    lock: &mut LockMgr,
    transfer: &mut TransferMgr,
    fab_config: &FabConfig,
    dt: f32,
) -> Vec<UnusualMoveEvent> {
    let mut events = Vec::new();
    let active: Vec<u32> = store.active_indices().collect();
    for veh_id in active {
        step_vehicle(store, sensors, edges, presets, lock, transfer, fab_config, veh_id, dt, &mut events);
    }
    events
}

const _: () = assert!(INVALID_INDEX == 0);

#[cfg(test)]
mod tests {
    use super::*;
    use railsim_common::consts::{MAX_PATH_LENGTH, SENSOR_DATA_SIZE, VEHICLE_DATA_SIZE};
    use railsim_common::graph::edge::{Axis, EdgeKind, RenderPoint};
    use railsim_common::sensor::{BodyPreset, ZonePreset};
    use railsim_common::vehicle::{LockGrantStrategy, TransferMode};
    use railsim_memory::SharedRegion;

    fn fab_config() -> FabConfig {
        FabConfig {
            fab_id: "fab_0".into(),
            map_path: "map.toml".into(),
            max_vehicles: 10,
            lock_grant_strategy: LockGrantStrategy::Fifo,
            transfer_mode: TransferMode::Loop,
            render_offset_x: 0.0,
            render_offset_y: 0.0,
            linear_max_speed: 2.0,
            curve_max_speed: 1.0,
            lock_wait_distance_straight: 1.0,
            lock_wait_distance_curve: 1.5,
        }
    }

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

    fn edge(name: &str, from: u32, to: u32, dist: f32) -> Edge {
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
            next_edge_indices: vec![],
            prev_edge_indices: vec![],
            is_deadlock_zone_inside: false,
            is_deadlock_zone_entry: false,
            deadlock_zone_id: None,
        }
    }

    fn setup(velocity: f32, accel: f32, ratio: f32) -> (EngineStore, SensorStore, Vec<SensorPreset>) {
        let mut store = EngineStore::new(
            SharedRegion::new(2 * VEHICLE_DATA_SIZE * 4).unwrap(),
            SharedRegion::new(2 * (MAX_PATH_LENGTH + 1) * 4).unwrap(),
            2,
            1,
        );
        store.add_vehicle(0, crate::store::VehicleInit {
            x: 0.0, y: 0.0, z: 0.0, edge_index: 1, edge_ratio: ratio, rotation: 0.0,
            velocity, acceleration: accel, deceleration: 0.0, moving_status: MovingStatus::Moving,
        }).unwrap();
        let sensors = SensorStore::new(SharedRegion::new(2 * SENSOR_DATA_SIZE * 4).unwrap());
        (store, sensors, vec![preset()])
    }

    #[test]
    fn paused_vehicle_is_untouched() {
        let (mut store, mut sensors, presets) = setup(0.0, 1.0, 0.0);
        store.set_moving_status(0, MovingStatus::Paused);
        let edges = vec![edge("E1", 1, 2, 10.0)];
        let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
        let mut transfer = TransferMgr::new();
        let fc = fab_config();
        let mut events = vec![];
        step_vehicle(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, 0, 1.0, &mut events);
        assert_eq!(store.edge_ratio(0), 0.0);
    }

    #[test]
    fn stopped_vehicle_forces_zero_velocity() {
        let (mut store, mut sensors, presets) = setup(3.0, 1.0, 0.2);
        store.set_moving_status(0, MovingStatus::Stopped);
        let edges = vec![edge("E1", 1, 2, 10.0)];
        let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
        let mut transfer = TransferMgr::new();
        let fc = fab_config();
        let mut events = vec![];
        step_vehicle(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, 0, 1.0, &mut events);
        assert_eq!(store.velocity(0), 0.0);
        assert_eq!(store.edge_ratio(0), 0.2);
    }

    #[test]
    fn stop_zone_holds_vehicle_and_sets_sensored() {
        let (mut store, mut sensors, presets) = setup(3.0, 1.0, 0.2);
        store.set_hit_zone(0, Some(HitZone::Stop));
        let edges = vec![edge("E1", 1, 2, 10.0)];
        let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
        let mut transfer = TransferMgr::new();
        let fc = fab_config();
        let mut events = vec![];
        step_vehicle(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, 0, 1.0, &mut events);
        assert_eq!(store.velocity(0), 0.0);
        assert!(store.stop_reason(0).contains(StopReason::SENSORED));
        assert_eq!(store.edge_ratio(0), 0.2);
    }

    #[test]
    fn integrates_speed_and_ratio_over_a_tick() {
        let (mut store, mut sensors, presets) = setup(0.0, 1.0, 0.0);
        let edges = vec![edge("E1", 1, 2, 10.0)];
        let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
        let mut transfer = TransferMgr::new();
        let fc = fab_config();
        let mut events = vec![];
        step_vehicle(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, 0, 1.0, &mut events);
        assert!((store.velocity(0) - 1.0).abs() < 1e-6);
        assert!((store.edge_ratio(0) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn velocity_clamps_to_linear_max_speed() {
        let (mut store, mut sensors, presets) = setup(1.9, 1.0, 0.0);
        let edges = vec![edge("E1", 1, 2, 10.0)];
        let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
        let mut transfer = TransferMgr::new();
        let fc = fab_config();
        let mut events = vec![];
        step_vehicle(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, 0, 1.0, &mut events);
        assert_eq!(store.velocity(0), fc.linear_max_speed);
    }

    #[test]
    fn first_tick_on_an_edge_enqueues_a_transfer() {
        let (mut store, mut sensors, presets) = setup(0.0, 0.0, 0.0);
        let edges = vec![edge("E1", 1, 2, 10.0)];
        let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
        let mut transfer = TransferMgr::new();
        let fc = fab_config();
        let mut events = vec![];
        step_vehicle(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, 0, 1.0, &mut events);
        assert_eq!(store.next_edge_state(0), NextEdgeState::Pending);
    }
}
