//! Prelude module for common re-exports.
//!
//! Convenient re-exports so consumers can do `use railsim_common::prelude::*;`
//! and get the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use railsim_common::prelude::*;
//! ```

// ─── Logging / configuration ────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, FabConfig, LogLevel, SensorPresetConfig, SharedConfig,
    SimulatorConfig,
};

// ─── System constants ────────────────────────────────────────────────
pub use crate::consts::*;

// ─── Graph ───────────────────────────────────────────────────────────
pub use crate::graph::edge::{Edge, EdgeKind};
pub use crate::graph::node::Node;

// ─── Vehicle / sensor state ─────────────────────────────────────────
pub use crate::sensor::SensorPreset;
pub use crate::vehicle::{
    HitZone, LockGrantStrategy, MovingStatus, NextEdgeState, StopReason, TrafficState,
    TransferMode,
};

// ─── Errors ──────────────────────────────────────────────────────────
pub use crate::error::EngineError;

// ─── Watchdog ────────────────────────────────────────────────────────
pub use crate::watchdog::{HealthStatus, ManagedModule, Watchdog, WatchdogError};
