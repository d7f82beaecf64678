//! Worker <-> orchestrator message types (spec.md §6).
//!
//! Plain serde-friendly structs/enums, in the style of the reference
//! `evo_shared_memory::data::system` cross-module JSON payloads, adapted to
//! the in-process channel carrying worker control messages instead of a
//! shared-memory JSON segment.

use crate::config::FabConfig;
use serde::{Deserialize, Serialize};

/// An external command payload, keyed by a vehicle id that may arrive as
/// either a bare integer or a `"VEHnnnnn"` string (§4.8 / §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VehicleId {
    Index(u32),
    Tag(String),
}

impl VehicleId {
    /// Resolve to a 1-based vehicle index. `"VEHnnnnn"` strings are parsed
    /// by stripping the `VEH` prefix and leading zeros; malformed tags
    /// return `None` (caller logs and drops, per §7 command-error policy).
    pub fn resolve(&self) -> Option<u32> {
        match self {
            VehicleId::Index(i) => Some(*i),
            VehicleId::Tag(s) => {
                let digits = s.strip_prefix("VEH")?;
                digits.parse::<u32>().ok()
            }
        }
    }
}

/// An external dispatch command routed to `DispatchMgr` (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchCommand {
    pub veh_id: VehicleId,
    pub payload: serde_json::Value,
}

/// Orchestrator -> worker control messages (spec.md §5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerMessage {
    Init {
        fabs: Vec<FabConfig>,
        shared_map_data: Option<serde_json::Value>,
    },
    SetRenderBuffer {
        fab_assignments: Vec<FabRenderAssignment>,
        total_vehicles: u32,
    },
    Start,
    Stop,
    Pause,
    Resume,
    Dispose,
    Command {
        fab_id: String,
        payload: DispatchCommand,
    },
    AddFab {
        fab: FabConfig,
    },
    RemoveFab {
        fab_id: String,
    },
    SetLoggerPort {
        port: u16,
        worker_id: u32,
    },
    GetLockTable {
        fab_id: String,
        request_id: u64,
    },
}

/// Per-fab slice assignment within the continuous render region (§4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FabRenderAssignment {
    pub vehicle_start_index: u32,
    pub vehicle_count: u32,
}

/// Position snapshot carried in `UNUSUAL_MOVE`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position2 {
    pub x: f32,
    pub y: f32,
}

/// Edge reference carried in `UNUSUAL_MOVE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRef {
    pub name: String,
    pub node: String,
}

/// Aggregated step-time statistics, reported every
/// [`crate::consts::PERF_STATS_INTERVAL_S`] seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerfStats {
    pub avg_step_ms: f64,
    pub min_step_ms: f64,
    pub max_step_ms: f64,
    pub std_dev: f64,
    pub cv: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub sample_count: u64,
}

/// Worker -> orchestrator messages (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrchestratorMessage {
    Ready,
    Initialized { fab_vehicle_counts: Vec<(String, u32)> },
    Disposed,
    Error { message: String },
    PerfStats { stats: PerfStats, fab_vehicle_counts: Vec<(String, u32)> },
    FabAdded { fab_id: String, actual_num_vehicles: u32 },
    FabRemoved { fab_id: String },
    LockTable { fab_id: String, request_id: u64, data: serde_json::Value },
    UnusualMove {
        vehicle_index: u32,
        fab_id: String,
        prev_edge: EdgeRef,
        next_edge: EdgeRef,
        position: Position2,
        timestamp_us: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_id_resolves_index() {
        assert_eq!(VehicleId::Index(42).resolve(), Some(42));
    }

    #[test]
    fn vehicle_id_resolves_tag() {
        assert_eq!(VehicleId::Tag("VEH00042".to_string()).resolve(), Some(42));
    }

    #[test]
    fn vehicle_id_rejects_malformed_tag() {
        assert_eq!(VehicleId::Tag("NOPE".to_string()).resolve(), None);
        assert_eq!(VehicleId::Tag("VEHxyz".to_string()).resolve(), None);
    }

    #[test]
    fn vehicle_id_untagged_deserialization() {
        let from_int: VehicleId = serde_json::from_str("42").unwrap();
        assert_eq!(from_int.resolve(), Some(42));
        let from_str: VehicleId = serde_json::from_str("\"VEH00007\"").unwrap();
        assert_eq!(from_str.resolve(), Some(7));
    }
}
