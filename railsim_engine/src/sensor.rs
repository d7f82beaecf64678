//! Sensor geometry and the SAT collision kernel (spec.md §4.3).
//!
//! Grounded on the reference's nested-rectangle proximity sensors,
//! generalized from the HAL's axis-local geometry helpers
//! (`evo_hal::drivers::simulation::physics::axis`) into vehicle-body SAT
//! quads. Per vehicle the sensor region holds three zones (approach/brake/
//! stop) x six named points (FL, FR, SL, SR, BL, BR) x (x, y) — see
//! `railsim_common::consts::SENSOR_DATA_SIZE`. The body rectangle's back
//! corners are not duplicated per zone; they live only in zone 0's BL/BR
//! slots, since the body doesn't change shape zone to zone.

use railsim_common::consts::SENSOR_DATA_SIZE;
use railsim_common::sensor::SensorPreset;
use railsim_common::vehicle::HitZone;
use railsim_memory::SharedRegion;

const POINTS_PER_ZONE: usize = 6;
const FLOATS_PER_ZONE: usize = POINTS_PER_ZONE * 2;

type Point = (f32, f32);
type Quad = [Point; 4];

fn point_offset(zone: usize, point: usize) -> usize {
    zone * FLOATS_PER_ZONE + point * 2
}

/// Typed view over one fab's sensor shared region.
pub struct SensorStore {
    region: SharedRegion,
}

impl SensorStore {
    pub fn new(region: SharedRegion) -> Self {
        Self { region }
    }

    fn base(&self, idx: u32) -> usize {
        idx as usize * SENSOR_DATA_SIZE
    }

    fn point(&self, idx: u32, zone: usize, point: usize) -> Point {
        let off = self.base(idx) + point_offset(zone, point);
        let data = self.region.as_f32_slice();
        (data[off], data[off + 1])
    }

    fn set_point(&mut self, idx: u32, zone: usize, point: usize, p: Point) {
        let off = self.base(idx) + point_offset(zone, point);
        let data = self.region.as_f32_slice_mut();
        data[off] = p.0;
        data[off + 1] = p.1;
    }

    /// Rewrites all three zones' six points from `(x, y, rotation)` and `preset`.
    pub fn update_sensor_points(&mut self, idx: u32, x: f32, y: f32, rotation: f32, preset: &SensorPreset) {
        let forward = (rotation.cos(), rotation.sin());
        let right = (rotation.sin(), -rotation.cos());

        for (zone_idx, zone) in preset.zones.iter().enumerate() {
            let half = zone.side_width;
            let fl = (
                x + forward.0 * zone.left_length + right.0 * half,
                y + forward.1 * zone.left_length + right.1 * half,
            );
            let fr = (
                x + forward.0 * zone.right_length - right.0 * half,
                y + forward.1 * zone.right_length - right.1 * half,
            );
            let sl = (x + right.0 * half, y + right.1 * half);
            let sr = (x - right.0 * half, y - right.1 * half);
            self.set_point(idx, zone_idx, 0, fl);
            self.set_point(idx, zone_idx, 1, fr);
            self.set_point(idx, zone_idx, 2, sl);
            self.set_point(idx, zone_idx, 3, sr);
        }

        let back_half = preset.body.width / 2.0;
        let bl = (
            x - forward.0 * preset.body.length + right.0 * back_half,
            y - forward.1 * preset.body.length + right.1 * back_half,
        );
        let br = (
            x - forward.0 * preset.body.length - right.0 * back_half,
            y - forward.1 * preset.body.length - right.1 * back_half,
        );
        self.set_point(idx, 0, 4, bl);
        self.set_point(idx, 0, 5, br);
    }

    /// Zone `i`'s extended quad: FL -> SL -> SR -> FR.
    fn zone_quad(&self, idx: u32, zone: usize) -> Quad {
        [
            self.point(idx, zone, 0),
            self.point(idx, zone, 2),
            self.point(idx, zone, 3),
            self.point(idx, zone, 1),
        ]
    }

    /// The vehicle's fixed body quad: FL -> BL -> BR -> FR, all from zone 0.
    fn body_quad(&self, idx: u32) -> Quad {
        [
            self.point(idx, 0, 0),
            self.point(idx, 0, 4),
            self.point(idx, 0, 5),
            self.point(idx, 0, 1),
        ]
    }

    /// The seven render-section point-pairs for one vehicle, in the layout
    /// order `[zone0_startEnd, zone0_other, zone1_startEnd, zone1_other,
    /// zone2_startEnd, zone2_other, body_other]` (spec.md §4.1/§6): each
    /// zone's FL/FR feed its `_start_end` section, SL/SR feed its `_other`
    /// section, and the shared body BL/BR (stored in zone 0's slots 4/5)
    /// feed `body_other`. Each entry is `[x0, y0, x1, y1]`.
    pub fn render_section_points(&self, idx: u32) -> [[f32; 4]; 7] {
        let pair = |zone: usize, a: usize, b: usize| {
            let (x0, y0) = self.point(idx, zone, a);
            let (x1, y1) = self.point(idx, zone, b);
            [x0, y0, x1, y1]
        };
        [
            pair(0, 0, 1), // zone0 FL, FR
            pair(0, 2, 3), // zone0 SL, SR
            pair(1, 0, 1), // zone1 FL, FR
            pair(1, 2, 3), // zone1 SL, SR
            pair(2, 0, 1), // zone2 FL, FR
            pair(2, 2, 3), // zone2 SL, SR
            pair(0, 4, 5), // body BL, BR (shared with zone0)
        ]
    }

    /// Cheap prefilter: squared distance between both vehicles' FL points.
    pub fn rough_distance_check(&self, a: u32, b: u32, threshold_sq: f32) -> bool {
        let pa = self.point(a, 0, 0);
        let pb = self.point(b, 0, 0);
        let dx = pa.0 - pb.0;
        let dy = pa.1 - pb.1;
        dx * dx + dy * dy <= threshold_sq
    }

    /// Checks `self_idx`'s sensor zones (innermost, i.e. STOP, first) against
    /// `target_idx`'s fixed body quad. Returns the first (worst) zone both
    /// polygons' SAT axes agree overlap on, else `None`.
    pub fn check_sensor_collision(&self, self_idx: u32, target_idx: u32) -> Option<HitZone> {
        let body = self.body_quad(target_idx);
        for zone in [2usize, 1, 0] {
            let quad = self.zone_quad(self_idx, zone);
            if sat_quad_check(&quad, &body) && sat_quad_check(&body, &quad) {
                return HitZone::from_buffer_value(zone as f32);
            }
        }
        None
    }
}

fn project(quad: &Quad, axis: Point) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for p in quad {
        let d = p.0 * axis.0 + p.1 * axis.1;
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

/// One-sided SAT test: projects both quads onto every edge normal of `a`;
/// returns `false` as soon as one axis separates them. Axes whose squared
/// length is below `1e-10` are degenerate (zero-length edge) and skipped.
fn sat_quad_check(a: &Quad, b: &Quad) -> bool {
    for i in 0..4 {
        let p0 = a[i];
        let p1 = a[(i + 1) % 4];
        let edge = (p1.0 - p0.0, p1.1 - p0.1);
        let axis = (-edge.1, edge.0);
        let len_sq = axis.0 * axis.0 + axis.1 * axis.1;
        if len_sq < 1e-10 {
            continue;
        }
        let (a_min, a_max) = project(a, axis);
        let (b_min, b_max) = project(b, axis);
        if a_max < b_min || b_max < a_min {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use railsim_common::sensor::{BodyPreset, ZonePreset};

    fn preset() -> SensorPreset {
        SensorPreset {
            name_index: 0,
            zones: [
                ZonePreset { left_length: 3.0, right_length: 3.0, side_width: 0.5, dec: -0.5 },
                ZonePreset { left_length: 2.0, right_length: 2.0, side_width: 0.5, dec: -1.0 },
                ZonePreset { left_length: 1.0, right_length: 1.0, side_width: 0.5, dec: f32::NEG_INFINITY },
            ],
            body: BodyPreset { length: 0.6, width: 0.8 },
        }
    }

    fn sensors(max_vehicles: u32) -> SensorStore {
        let region = SharedRegion::new(max_vehicles as usize * SENSOR_DATA_SIZE * 4).unwrap();
        SensorStore::new(region)
    }

    #[test]
    fn overlapping_bodies_report_stop_zone() {
        let mut s = sensors(2);
        let preset = preset();
        s.update_sensor_points(0, 0.0, 0.0, 0.0, &preset);
        s.update_sensor_points(1, 0.9, 0.0, 0.0, &preset);
        assert_eq!(s.check_sensor_collision(0, 1), Some(HitZone::Stop));
    }

    #[test]
    fn distant_bodies_report_no_collision() {
        let mut s = sensors(2);
        let preset = preset();
        s.update_sensor_points(0, 0.0, 0.0, 0.0, &preset);
        s.update_sensor_points(1, 50.0, 0.0, 0.0, &preset);
        assert_eq!(s.check_sensor_collision(0, 1), None);
    }

    #[test]
    fn approach_zone_detected_before_stop() {
        let mut s = sensors(2);
        let preset = preset();
        s.update_sensor_points(0, 0.0, 0.0, 0.0, &preset);
        s.update_sensor_points(1, 2.5, 0.0, 0.0, &preset);
        assert_eq!(s.check_sensor_collision(0, 1), Some(HitZone::Approach));
    }

    #[test]
    fn rough_distance_check_respects_threshold() {
        let mut s = sensors(2);
        let preset = preset();
        s.update_sensor_points(0, 0.0, 0.0, 0.0, &preset);
        s.update_sensor_points(1, 1.0, 0.0, 0.0, &preset);
        assert!(s.rough_distance_check(0, 1, 4.0));
        assert!(!s.rough_distance_check(0, 1, 0.5));
    }

    #[test]
    fn render_section_points_match_zone_and_body_corners() {
        let mut s = sensors(1);
        let preset = preset();
        s.update_sensor_points(0, 0.0, 0.0, 0.0, &preset);
        let sections = s.render_section_points(0);
        assert_eq!(sections[0], {
            let (x0, y0) = s.point(0, 0, 0);
            let (x1, y1) = s.point(0, 0, 1);
            [x0, y0, x1, y1]
        });
        assert_eq!(sections[6], {
            let (x0, y0) = s.point(0, 0, 4);
            let (x1, y1) = s.point(0, 0, 5);
            [x0, y0, x1, y1]
        });
    }
}
