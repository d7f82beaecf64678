//! Collision pipeline (spec.md §4.4): following, merge-zone, and next-path
//! checks, each producing a candidate `(hitZone, target)` per vehicle, then
//! reconciled by the detail floor in [`apply::apply_collision_zone_logic`].

pub mod apply;
pub mod following;
pub mod merge_zone;
pub mod next_path;

use railsim_common::graph::Edge;
use railsim_common::vehicle::HitZone;
use std::collections::HashMap;

use crate::sensor::SensorStore;
use crate::store::EngineStore;

/// Best `(zone, target)` seen so far for a vehicle this tick. The detail
/// floor (spec.md §4.4) means later sources only overwrite an entry when
/// their zone outranks what is already recorded.
#[derive(Default)]
pub struct CollisionAccumulator {
    best: HashMap<u32, (HitZone, u32)>,
}

impl CollisionAccumulator {
    pub fn record(&mut self, vehicle: u32, zone: Option<HitZone>, target: u32) {
        let Some(zone) = zone else { return };
        match self.best.get(&vehicle) {
            Some((existing, _)) if *existing >= zone => {}
            _ => {
                self.best.insert(vehicle, (zone, target));
            }
        }
    }

    pub fn into_inner(self) -> HashMap<u32, (HitZone, u32)> {
        self.best
    }
}

/// Runs all three collision sources for every edge in `edges`, then applies
/// the reconciled result to every active vehicle (spec.md §4.4 "Run for
/// every edge in the fab").
pub fn run_collision_pipeline(
    store: &mut EngineStore,
    sensors: &SensorStore,
    edges: &[Edge],
    presets: &[railsim_common::sensor::SensorPreset],
) {
    let mut acc = CollisionAccumulator::default();

    for (edge_idx_zero, edge) in edges.iter().enumerate() {
        let edge_idx = edge_idx_zero as u32 + 1;
        following::check_following_collision(store, sensors, edge, edge_idx, presets, &mut acc);
        merge_zone::check_merge_zone_collision(store, sensors, edges, edge_idx, presets, &mut acc);
    }
    next_path::check_next_path_collisions(store, sensors, edges, &mut acc);

    apply::apply_all(store, presets, acc);
}
