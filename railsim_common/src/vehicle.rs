//! Per-vehicle state enums and bitflags (spec.md §3).
//!
//! These are the tagged values stored in the shared vehicle-data region by
//! `railsim_engine::store::EngineStore`; this crate only defines their
//! in-memory/wire representation, not the stride layout.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Movement sub-record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MovingStatus {
    Moving = 0,
    Stopped = 1,
    Paused = 2,
}

/// Worst sensor zone currently intersected by another vehicle's body.
/// `-1` (absence of any hit) is represented as `None` at the type level;
/// the shared-buffer encoding uses `-1.0` per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i8)]
pub enum HitZone {
    Approach = 0,
    Brake = 1,
    Stop = 2,
}

impl HitZone {
    /// Encode as the `f32` sentinel used in the shared buffer (`-1.0` = none).
    pub fn to_buffer_value(value: Option<HitZone>) -> f32 {
        match value {
            None => -1.0,
            Some(z) => z as u8 as f32,
        }
    }

    /// Decode the shared-buffer sentinel back into `Option<HitZone>`.
    pub fn from_buffer_value(value: f32) -> Option<HitZone> {
        match value.round() as i32 {
            0 => Some(HitZone::Approach),
            1 => Some(HitZone::Brake),
            2 => Some(HitZone::Stop),
            _ => None,
        }
    }

    /// The higher hit zone wins for a tick (§4.4 detail floor).
    pub fn max(a: Option<HitZone>, b: Option<HitZone>) -> Option<HitZone> {
        match (a, b) {
            (None, x) => x,
            (x, None) => x,
            (Some(x), Some(y)) => Some(if x >= y { x } else { y }),
        }
    }
}

/// Merge-lock state of a vehicle approaching a merge-bound edge (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TrafficState {
    Free = 0,
    Waiting = 1,
    Acquired = 2,
}

bitflags! {
    /// Reasons a vehicle's velocity is currently forced/clamped.
    ///
    /// Mirrors the reference HAL's `ERROR_*` bit constants
    /// (`evo_hal::drivers::simulation::physics::axis`), generalized from a
    /// `u16` error code into a real `bitflags!` type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct StopReason: u8 {
        /// Waiting on a merge-lock grant (§4.5).
        const LOCKED   = 0b0000_0001;
        /// Another vehicle's body is inside this vehicle's STOP sensor zone.
        const SENSORED = 0b0000_0010;
        /// External emergency-stop command in effect.
        const E_STOP   = 0b0000_0100;
    }
}

/// Transfer-queue handshake state for "what's my next edge" (§4.6 step 5, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NextEdgeState {
    /// No pending request; `nextEdge` is not meaningful.
    Empty = 0,
    /// Enqueued on the `TransferMgr` queue, awaiting a decision.
    Pending = 1,
    /// `nextEdge` has been chosen and is ready to consume on ratio overflow.
    Ready = 2,
}

/// Merge-lock grant-selection policy (§4.5), a closed set — unknown values
/// are rejected at config load rather than guessed at (§9 Open Question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockGrantStrategy {
    /// First waiter (by request order) wins.
    #[default]
    Fifo,
    /// Prefers a waiter whose request arose from a deadlock-zone entry edge
    /// over one that did not; ties broken by FIFO order.
    BranchFifo,
}

/// `TransferMgr` next-edge selection mode (§4.8 / GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Canonical next-edge chain (`nextEdgeIndices[0]`) precomputed per vehicle.
    #[default]
    Loop,
    /// Uniform pick among the current edge's `nextEdgeIndices`.
    Random,
}
