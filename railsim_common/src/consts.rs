//! System-wide constants for the `railsim` workspace.
//!
//! Single source of truth for stride sizes and spatial limits. Imported by
//! all crates — no duplication permitted.

/// Number of `f32` slots per vehicle in the shared vehicle-data region.
///
/// Movement sub-record (x, y, z, rotation, velocity, acceleration,
/// deceleration, edgeRatio, currentEdge, nextEdge, nextEdgeState,
/// movingStatus) + sensor sub-record (presetIdx, hitZone, collisionTarget) +
/// logic sub-record (trafficState, stopReason, jobState) rounded up for
/// cache-line headroom.
pub const VEHICLE_DATA_SIZE: usize = 22;

/// Number of `f32` slots per vehicle in the shared sensor-geometry region:
/// three zones x six points (FL, FR, SL, SR, BL, BR) x 2 floats (x, y).
pub const SENSOR_DATA_SIZE: usize = 36;

/// Maximum upcoming edges stored in a vehicle's path buffer.
pub const MAX_PATH_LENGTH: usize = 100;

/// Maximum vehicles a single fab may host (path/checkpoint buffer sizing).
pub const MAX_VEHICLES_PER_FAB: usize = 20_000;

/// Maximum fabs a single `MultiWorkerController` instance manages.
pub const MAX_FABS: usize = 64;

/// Curve merge-zone danger-length term (meters), added to `2 * bodyLength`.
pub const CURVE_TAIL_LENGTH_M: f32 = 0.5;

/// Minimum linear edge length eligible for automatic vehicle placement (meters).
pub const EDGE_MIN_LENGTH_M: f32 = 5.0;

/// Spacing between automatically placed vehicles along an edge (meters).
pub const VEHICLE_SPACING_M: f32 = 2.0;

/// Margin reserved at both ends of an edge during automatic placement (meters).
pub const NODE_MARGIN_M: f32 = 1.0;

/// Look-through threshold (meters): LINEAR edges shorter than this are
/// transparently skipped by the next-path collision BFS.
pub const SHORT_EDGE_LOOKTHROUGH_M: f32 = 2.0;

/// Cache line size used for shared-region alignment (bytes).
pub const CACHE_LINE_SIZE: usize = 64;

/// Default simulator tick rate (Hz).
pub const DEFAULT_TARGET_FPS: f64 = 60.0;

/// Default clamp on a single tick's delta (seconds), per the backpressure policy.
pub const DEFAULT_MAX_DELTA_S: f64 = 0.1;

/// Interval between `PERF_STATS` reports (seconds).
pub const PERF_STATS_INTERVAL_S: u64 = 5;

/// Timeout the orchestrator waits for a `DISPOSED` acknowledgement before
/// force-terminating a worker (milliseconds).
pub const DISPOSE_TIMEOUT_MS: u64 = 500;

/// Value used to denote "no edge/node/vehicle" (1-based indices reserve 0).
pub const INVALID_INDEX: u32 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(VEHICLE_DATA_SIZE > 0);
        assert!(SENSOR_DATA_SIZE == 36);
        assert!(MAX_PATH_LENGTH >= 1);
        assert!(MAX_VEHICLES_PER_FAB > 0);
        assert_eq!(INVALID_INDEX, 0);
        assert!(DEFAULT_TARGET_FPS > 0.0);
        assert!(DEFAULT_MAX_DELTA_S > 0.0);
    }

    #[test]
    fn sensor_stride_matches_three_zones_six_points() {
        assert_eq!(SENSOR_DATA_SIZE, 3 * 6 * 2);
    }
}
