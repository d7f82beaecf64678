//! Property-based tests for the movement-integration invariants of spec.md
//! §8 ("For all vehicles, `velocity >= 0` and `velocity <= maxSpeed
//! (currentEdge)`"; ratio stays clamped to 1 without a `READY` next edge).
//!
//! Grounded on the reference property-test shape (`proptest!` blocks driving
//! a pure state transition over generated inputs, asserting an invariant
//! rather than a fixed expected value), applied to `step_vehicle` instead of
//! a render scheduler.

use proptest::prelude::*;

use railsim_common::config::FabConfig;
use railsim_common::consts::{MAX_PATH_LENGTH, SENSOR_DATA_SIZE, VEHICLE_DATA_SIZE};
use railsim_common::graph::edge::{Axis, EdgeKind, RenderPoint};
use railsim_common::graph::Edge;
use railsim_common::sensor::{BodyPreset, SensorPreset, ZonePreset};
use railsim_common::vehicle::{LockGrantStrategy, MovingStatus, TransferMode};
use railsim_engine::lock::LockMgr;
use railsim_engine::movement::step_vehicle;
use railsim_engine::sensor::SensorStore;
use railsim_engine::store::{EngineStore, VehicleInit};
use railsim_engine::transfer::TransferMgr;
use railsim_memory::SharedRegion;

fn fab_config() -> FabConfig {
    FabConfig {
        fab_id: "prop_fab".into(),
        map_path: "prop.toml".into(),
        max_vehicles: 1,
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

fn single_edge(distance: f32) -> Edge {
    Edge {
        name: "E1".into(),
        from_node: 1,
        to_node: 2,
        waypoints: vec![],
        kind: EdgeKind::Linear,
        distance,
        radius: None,
        rotation: None,
        axis: Axis::X,
        rendering_points: vec![
            RenderPoint { x: 0.0, y: 0.0, z: 0.0 },
            RenderPoint { x: distance, y: 0.0, z: 0.0 },
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

fn single_preset() -> SensorPreset {
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

proptest! {
    /// `velocity` never leaves `[0, maxSpeed(currentEdge)]` after one tick,
    /// regardless of starting velocity/acceleration/dt (spec.md §8).
    #[test]
    fn velocity_stays_within_max_speed(
        start_velocity in 0.0f32..5.0,
        accel in -5.0f32..5.0,
        start_ratio in 0.0f32..0.9,
        dt in 0.0f32..0.5,
    ) {
        let mut store = EngineStore::new(
            SharedRegion::new(VEHICLE_DATA_SIZE * 4).unwrap(),
            SharedRegion::new((MAX_PATH_LENGTH + 1) * 4).unwrap(),
            1,
            1,
        );
        store.add_vehicle(0, VehicleInit {
            x: 0.0, y: 0.0, z: 0.0, edge_index: 1, edge_ratio: start_ratio, rotation: 0.0,
            velocity: start_velocity, acceleration: accel, deceleration: 0.0,
            moving_status: MovingStatus::Moving,
        }).unwrap();
        let mut sensors = SensorStore::new(SharedRegion::new(SENSOR_DATA_SIZE * 4).unwrap());
        let edges = vec![single_edge(10.0)];
        let presets = vec![single_preset()];
        let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
        let mut transfer = TransferMgr::new();
        let fc = fab_config();
        let mut events = vec![];

        step_vehicle(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, 0, dt, &mut events);

        let v = store.velocity(0);
        prop_assert!(v >= 0.0);
        prop_assert!(v <= fc.linear_max_speed + 1e-6);
    }

    /// Without a `READY` next edge, `edgeRatio` is clamped to `1.0` rather
    /// than overflowing past the edge's end (spec.md §4.7, §8).
    #[test]
    fn ratio_never_exceeds_one_without_a_ready_next_edge(
        start_velocity in 0.0f32..5.0,
        start_ratio in 0.0f32..1.0,
        dt in 0.0f32..1.0,
    ) {
        let mut store = EngineStore::new(
            SharedRegion::new(VEHICLE_DATA_SIZE * 4).unwrap(),
            SharedRegion::new((MAX_PATH_LENGTH + 1) * 4).unwrap(),
            1,
            1,
        );
        store.add_vehicle(0, VehicleInit {
            x: 0.0, y: 0.0, z: 0.0, edge_index: 1, edge_ratio: start_ratio, rotation: 0.0,
            velocity: start_velocity, acceleration: 0.0, deceleration: 0.0,
            moving_status: MovingStatus::Moving,
        }).unwrap();
        let mut sensors = SensorStore::new(SharedRegion::new(SENSOR_DATA_SIZE * 4).unwrap());
        let edges = vec![single_edge(10.0)];
        let presets = vec![single_preset()];
        let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
        let mut transfer = TransferMgr::new();
        let fc = fab_config();
        let mut events = vec![];

        step_vehicle(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, 0, dt, &mut events);

        prop_assert!(store.edge_ratio(0) <= 1.0 + 1e-6);
    }
}
