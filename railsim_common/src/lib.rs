//! railsim common library
//!
//! Shared types, constants, and configuration loading utilities for the
//! `railsim` multi-fab traffic-simulation workspace: the rail-graph data
//! model, vehicle state enums, sensor presets, worker/orchestrator message
//! types, and the `EngineError`/`Watchdog` contracts used across crates.
//!
//! # Module structure
//!
//! - [`graph`] - `Node`/`Edge`/`EdgeKind` rail-graph data model
//! - [`vehicle`] - movement/sensor/logic state enums and bitflags
//! - [`sensor`] - sensor preset geometry configuration
//! - [`command`] - worker <-> orchestrator message types
//! - [`config`] - configuration loading traits and types
//! - [`error`] - the `EngineError` sum type
//! - [`watchdog`] - worker supervision contract
//! - [`prelude`] - common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use railsim_common::prelude::*;
//! ```

pub mod command;
pub mod config;
pub mod consts;
pub mod error;
pub mod graph;
pub mod prelude;
pub mod sensor;
pub mod vehicle;
pub mod watchdog;
