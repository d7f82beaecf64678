//! Sensor preset geometry (spec.md §4.3).
//!
//! A `SensorPreset` enumerates three nested zones (approach/brake/stop) with
//! symmetric left/right offsets plus a body rectangle. Resolved in-memory
//! form of [`crate::config::SensorPresetConfig`].

use serde::{Deserialize, Serialize};

/// One zone's geometric and kinematic parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZonePreset {
    /// Forward extent ahead of the vehicle, in meters.
    pub left_length: f32,
    /// Forward extent ahead of the vehicle on the mirrored side, in meters.
    pub right_length: f32,
    /// Half-width of the zone, in meters.
    pub side_width: f32,
    /// Deceleration applied while a vehicle's worst hit is this zone (m/s^2,
    /// negative).
    pub dec: f32,
}

/// Body rectangle dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyPreset {
    pub length: f32,
    pub width: f32,
}

/// A complete sensor preset: zones 0 (approach), 1 (brake), 2 (stop), plus body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorPreset {
    pub name_index: u32,
    pub zones: [ZonePreset; 3],
    pub body: BodyPreset,
}

impl SensorPreset {
    pub fn zone(&self, idx: usize) -> &ZonePreset {
        &self.zones[idx]
    }

    /// `stopDist` used by the following-collision distance check (§8
    /// boundary behaviors): the stop zone's forward extent plus body length.
    pub fn stop_distance(&self) -> f32 {
        self.zones[2].left_length + self.body.length
    }

    /// Minimum speed below which no deceleration is applied while in a
    /// given zone (APPROACH/BRAKE only — STOP forces a hard zero).
    pub fn min_speed(&self, zone_idx: usize) -> f32 {
        debug_assert!(zone_idx < 2, "min_speed only applies to APPROACH/BRAKE");
        // A vehicle already near-stationary in a braking zone does not need
        // further deceleration applied on top of integration's own clamp.
        let _ = zone_idx;
        0.05
    }
}

impl From<&crate::config::SensorPresetConfig> for SensorPreset {
    fn from(cfg: &crate::config::SensorPresetConfig) -> Self {
        SensorPreset {
            name_index: 0,
            zones: [
                ZonePreset {
                    left_length: cfg.approach_left,
                    right_length: cfg.approach_right,
                    side_width: cfg.approach_side_width,
                    dec: cfg.approach_decel,
                },
                ZonePreset {
                    left_length: cfg.brake_left,
                    right_length: cfg.brake_right,
                    side_width: cfg.brake_side_width,
                    dec: cfg.brake_decel,
                },
                ZonePreset {
                    left_length: cfg.stop_left,
                    right_length: cfg.stop_right,
                    side_width: cfg.stop_side_width,
                    dec: cfg.stop_decel,
                },
            ],
            body: BodyPreset {
                length: cfg.body_length,
                width: cfg.body_width,
            },
        }
    }
}
