//! End-to-end scenario tests (spec.md §8 "End-to-end scenarios" 1 and 6),
//! run against the real per-tick pipeline rather than a single
//! `step_vehicle` call.
//!
//! Grounded on the reference's full-cycle scenario tests that drive several
//! simulated seconds through the public API and assert on emergent state,
//! rather than unit-testing one function in isolation.

use railsim_common::config::FabConfig;
use railsim_common::consts::{MAX_PATH_LENGTH, SENSOR_DATA_SIZE, VEHICLE_DATA_SIZE};
use railsim_common::graph::edge::{Axis, EdgeKind, RenderPoint};
use railsim_common::graph::Edge;
use railsim_common::sensor::{BodyPreset, SensorPreset, ZonePreset};
use railsim_common::vehicle::{HitZone, LockGrantStrategy, MovingStatus, TransferMode};
use railsim_engine::collision::run_collision_pipeline;
use railsim_engine::config::{AxisConfig, EdgeConfig, FabMapConfig, NodeConfig, VehiclePlacementConfig};
use railsim_engine::fab::FabContext;
use railsim_engine::lock::LockMgr;
use railsim_engine::movement::{step_all, update_lock_requests};
use railsim_engine::store::{EngineStore, VehicleInit};
use railsim_engine::transfer::TransferMgr;
use railsim_memory::render::RenderBuffer;
use railsim_memory::layout::RenderSlice;
use railsim_memory::SharedRegion;

fn fab_config() -> FabConfig {
    FabConfig {
        fab_id: "scenario_fab".into(),
        map_path: "scenario.toml".into(),
        max_vehicles: 2,
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

fn straight_edge(distance: f32) -> Edge {
    Edge {
        name: "E_X".into(),
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

/// Scenario 1: single straight edge, two vehicles, back one brakes to a full
/// stop as it closes on the leader, passing through every hit-zone on the
/// way (spec.md §8 scenario 1).
#[test]
fn straight_edge_back_vehicle_brakes_through_every_zone_to_a_stop() {
    let mut store = EngineStore::new(
        SharedRegion::new(2 * VEHICLE_DATA_SIZE * 4).unwrap(),
        SharedRegion::new(2 * (MAX_PATH_LENGTH + 1) * 4).unwrap(),
        2,
        1,
    );
    // Tail (back) vehicle added first so it is the queue's first entry. Gap
    // starts past `approachDist` (4 m with this preset) so `NONE` is
    // observed before the vehicle closes in on the leader.
    store
        .add_vehicle(0, VehicleInit {
            x: 1.0, y: 0.0, z: 0.0, edge_index: 1, edge_ratio: 0.1, rotation: 0.0,
            velocity: 0.0, acceleration: 1.0, deceleration: 0.0,
            moving_status: MovingStatus::Moving,
        })
        .unwrap();
    // Lead vehicle stays put: zero accel keeps it effectively stationary at
    // ratio 0.6, close enough to observe the back vehicle's approach through
    // every hit zone.
    store
        .add_vehicle(1, VehicleInit {
            x: 6.0, y: 0.0, z: 0.0, edge_index: 1, edge_ratio: 0.6, rotation: 0.0,
            velocity: 0.0, acceleration: 0.0, deceleration: 0.0,
            moving_status: MovingStatus::Moving,
        })
        .unwrap();

    let mut sensors = railsim_engine::sensor::SensorStore::new(SharedRegion::new(2 * SENSOR_DATA_SIZE * 4).unwrap());
    let preset = preset();
    for idx in [0u32, 1] {
        let (x, y, _z) = store.position(idx);
        sensors.update_sensor_points(idx, x, y, store.rotation(idx), &preset);
    }
    let edges = vec![straight_edge(10.0)];
    let presets = vec![preset];
    let mut lock = LockMgr::new(LockGrantStrategy::Fifo);
    let mut transfer = TransferMgr::new();
    let fc = fab_config();

    let mut zones_seen = vec![store.hit_zone(0)];
    let dt = 1.0 / 60.0;
    for _ in 0..(2.0 / dt) as u32 {
        run_collision_pipeline(&mut store, &sensors, &edges, &presets);
        update_lock_requests(&mut store, &edges, &mut lock);
        transfer.process_transfer_queue(&mut store, &edges, fc.transfer_mode);
        let _ = step_all(&mut store, &mut sensors, &edges, &presets, &mut lock, &mut transfer, &fc, dt);

        let z = store.hit_zone(0);
        if z != *zones_seen.last().unwrap() {
            zones_seen.push(z);
        }
    }

    assert_eq!(
        zones_seen,
        vec![None, Some(HitZone::Approach), Some(HitZone::Brake), Some(HitZone::Stop)]
    );
    assert_eq!(store.velocity(0), 0.0);
    assert_eq!(store.moving_status(0), MovingStatus::Stopped);
}

/// Scenario 6: two fabs with identical maps, configs, and (deterministic)
/// seeds produce bitwise-identical vehicle poses after the same number of
/// ticks, independent of one another (spec.md §8 scenario 6). Render offset
/// is applied only at render-region write time, not to worker state, so
/// both fabs here use a zero offset and compare their render buffers.
#[test]
fn two_identically_configured_fabs_step_bitwise_identically() {
    fn map() -> FabMapConfig {
        FabMapConfig {
            nodes: vec![
                NodeConfig { name: "A".into(), x: 0.0, y: 0.0, z: 0.0, barcode: None },
                NodeConfig { name: "B".into(), x: 20.0, y: 0.0, z: 0.0, barcode: None },
            ],
            edges: vec![EdgeConfig {
                name: "E1".into(),
                from: "A".into(),
                to: "B".into(),
                waypoints: vec![],
                rail_type: "LINEAR".into(),
                distance: 20.0,
                radius: None,
                rotation: None,
                axis: AxisConfig::X,
                rendering_points: vec![[0.0, 0.0, 0.0], [20.0, 0.0, 0.0]],
            }],
            sensor_presets: vec![],
            vehicles: vec![
                VehiclePlacementConfig { veh_id: 0, edge_name: "E1".into(), ratio: 0.1 },
                VehiclePlacementConfig { veh_id: 1, edge_name: "E1".into(), ratio: 0.4 },
            ],
            auto_vehicle_count: None,
        }
    }

    fn config() -> FabConfig {
        let mut c = fab_config();
        c.max_vehicles = 4;
        c
    }

    let mut fab_0 = FabContext::init(config(), &map(), vec![]).unwrap();
    let mut fab_1 = FabContext::init(config(), &map(), vec![]).unwrap();
    fab_0.apply_signal(railsim_engine::state::ControlSignal::Start).unwrap();
    fab_1.apply_signal(railsim_engine::state::ControlSignal::Start).unwrap();

    for _ in 0..90 {
        fab_0.step(1.0 / 60.0);
        fab_1.step(1.0 / 60.0);
    }

    let slice = RenderSlice { vehicle_start_index: 0, vehicle_count: 2 };
    let mut buf_0 = RenderBuffer::new(8).unwrap();
    let mut buf_1 = RenderBuffer::new(8).unwrap();
    fab_0.write_render_region(&mut buf_0, slice).unwrap();
    fab_1.write_render_region(&mut buf_1, slice).unwrap();

    assert_eq!(buf_0.read_unsynchronized(), buf_1.read_unsynchronized());
    // Sanity check: the vehicles actually moved, so this isn't trivially
    // true because both stayed at their initial pose.
    assert!(buf_0.read_unsynchronized().iter().any(|&v| v != 0.0));
}
