//! `applyCollisionZoneLogic` (spec.md §4.4): the single write-path every
//! collision source's result is reconciled through.

use railsim_common::sensor::SensorPreset;
use railsim_common::vehicle::{HitZone, MovingStatus};

use super::CollisionAccumulator;
use crate::store::EngineStore;

/// Writes `hitZone`/`collisionTarget` for `veh_id` and applies the zone's
/// side effects:
/// - `None`: clear deceleration; resume from `STOPPED` to `MOVING`.
/// - `STOP`: force stop (`velocity = 0`, `deceleration = 0`).
/// - `BRAKE`/`APPROACH`: apply the zone's deceleration only while still
///   above the zone's minimum speed; keep/resume `MOVING` otherwise.
pub fn apply_collision_zone_logic(
    store: &mut EngineStore,
    preset: &SensorPreset,
    veh_id: u32,
    zone: Option<HitZone>,
    target: Option<u32>,
) {
    store.set_hit_zone(veh_id, zone);
    store.set_collision_target(veh_id, target);

    match zone {
        None => {
            store.set_deceleration(veh_id, 0.0);
            if store.moving_status(veh_id) == MovingStatus::Stopped {
                store.set_moving_status(veh_id, MovingStatus::Moving);
            }
        }
        Some(HitZone::Stop) => {
            store.set_moving_status(veh_id, MovingStatus::Stopped);
            store.set_velocity(veh_id, 0.0);
            store.set_deceleration(veh_id, 0.0);
        }
        Some(z @ (HitZone::Brake | HitZone::Approach)) => {
            let zone_idx = z as usize;
            let min_speed = preset.min_speed(zone_idx);
            if store.velocity(veh_id) > min_speed {
                store.set_deceleration(veh_id, preset.zone(zone_idx).dec);
            } else {
                store.set_deceleration(veh_id, 0.0);
            }
            if store.moving_status(veh_id) == MovingStatus::Stopped {
                store.set_moving_status(veh_id, MovingStatus::Moving);
            }
        }
    }
}

/// Apply the reconciled best `(zone, target)` to every active vehicle. A
/// vehicle with no recorded collision this tick gets `None` applied, which
/// clears its deceleration and resumes it from a prior `STOPPED` hit.
pub fn apply_all(store: &mut EngineStore, presets: &[SensorPreset], acc: CollisionAccumulator) {
    let best = acc.into_inner();
    let active: Vec<u32> = store.active_indices().collect();
    for veh_id in active {
        if store.moving_status(veh_id) == MovingStatus::Paused {
            continue;
        }
        let preset = &presets[store.preset_idx(veh_id) as usize];
        match best.get(&veh_id) {
            Some(&(zone, target)) => {
                apply_collision_zone_logic(store, preset, veh_id, Some(zone), Some(target));
            }
            None => {
                apply_collision_zone_logic(store, preset, veh_id, None, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railsim_common::consts::{MAX_PATH_LENGTH, VEHICLE_DATA_SIZE};
    use railsim_common::sensor::{BodyPreset, ZonePreset};
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

    fn store() -> EngineStore {
        let mut s = EngineStore::new(
            SharedRegion::new(2 * VEHICLE_DATA_SIZE * 4).unwrap(),
            SharedRegion::new(2 * (MAX_PATH_LENGTH + 1) * 4).unwrap(),
            2,
            1,
        );
        s.add_vehicle(0, crate::store::VehicleInit {
            x: 0.0, y: 0.0, z: 0.0, edge_index: 1, edge_ratio: 0.0, rotation: 0.0,
            velocity: 2.0, acceleration: 1.0, deceleration: 0.0, moving_status: MovingStatus::Moving,
        }).unwrap();
        s
    }

    #[test]
    fn stop_zone_forces_hard_stop() {
        let mut s = store();
        let p = preset();
        apply_collision_zone_logic(&mut s, &p, 0, Some(HitZone::Stop), Some(9));
        assert_eq!(s.moving_status(0), MovingStatus::Stopped);
        assert_eq!(s.velocity(0), 0.0);
        assert_eq!(s.deceleration(0), 0.0);
        assert_eq!(s.collision_target(0), Some(9));
    }

    #[test]
    fn brake_zone_applies_preset_deceleration_above_min_speed() {
        let mut s = store();
        let p = preset();
        apply_collision_zone_logic(&mut s, &p, 0, Some(HitZone::Brake), Some(9));
        assert_eq!(s.deceleration(0), -1.0);
        assert_eq!(s.moving_status(0), MovingStatus::Moving);
    }

    #[test]
    fn none_clears_deceleration_and_resumes_stopped_vehicle() {
        let mut s = store();
        s.set_moving_status(0, MovingStatus::Stopped);
        s.set_deceleration(0, -1.0);
        let p = preset();
        apply_collision_zone_logic(&mut s, &p, 0, None, None);
        assert_eq!(s.deceleration(0), 0.0);
        assert_eq!(s.moving_status(0), MovingStatus::Moving);
    }

    #[test]
    fn paused_vehicles_are_skipped_by_apply_all() {
        let mut s = store();
        s.set_moving_status(0, MovingStatus::Paused);
        let presets = vec![preset()];
        apply_all(&mut s, &presets, CollisionAccumulator::default());
        assert_eq!(s.moving_status(0), MovingStatus::Paused);
    }
}
