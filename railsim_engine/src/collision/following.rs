//! Following collision (spec.md §4.4 step 1): front/back pairs within one
//! edge's vehicle queue.

use railsim_common::graph::edge::Axis;
use railsim_common::graph::Edge;
use railsim_common::sensor::SensorPreset;
use railsim_common::vehicle::HitZone;

use super::CollisionAccumulator;
use crate::sensor::SensorStore;
use crate::store::EngineStore;

/// Maps a 1-D gap to a hit zone using the rear vehicle's own preset
/// thresholds: `stopDist`/`brakeDist`/`approachDist = zone[i].leftLength +
/// bodyLength`.
fn determine_linear_hit_zone(distance: f32, preset: &SensorPreset) -> Option<HitZone> {
    let stop_dist = preset.zones[2].left_length + preset.body.length;
    let brake_dist = preset.zones[1].left_length + preset.body.length;
    let approach_dist = preset.zones[0].left_length + preset.body.length;
    if distance <= stop_dist {
        Some(HitZone::Stop)
    } else if distance <= brake_dist {
        Some(HitZone::Brake)
    } else if distance <= approach_dist {
        Some(HitZone::Approach)
    } else {
        None
    }
}

pub fn check_following_collision(
    store: &EngineStore,
    sensors: &SensorStore,
    edge: &Edge,
    edge_idx: u32,
    presets: &[SensorPreset],
    acc: &mut CollisionAccumulator,
) {
    let Some(queue) = store.queue(edge_idx) else { return };
    for (rear, lead) in queue.adjacent_pairs() {
        let zone = if edge.kind.is_curve() {
            sensors.check_sensor_collision(rear, lead)
        } else {
            let (rx, ry, _) = store.position(rear);
            let (lx, ly, _) = store.position(lead);
            let distance = match edge.axis {
                Axis::X => (rx - lx).abs(),
                Axis::Y => (ry - ly).abs(),
            };
            let preset = &presets[store.preset_idx(rear) as usize];
            determine_linear_hit_zone(distance, preset)
        };
        acc.record(rear, zone, lead);
    }
}
