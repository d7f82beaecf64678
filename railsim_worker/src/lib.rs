//! Per-worker simulation runtime (spec.md §5): drives a disjoint partition
//! of fabs through the fixed per-tick pipeline, samples step timing, and
//! exchanges control/status messages with the orchestrator.
//!
//! ## Module overview
//!
//! - [`engine`]: `SimulationEngine`, owning a worker's `Vec<FabContext>`.
//! - [`perf`]: `PerfSampler`, the step-duration accumulator behind
//!   `PERF_STATS`.
//! - [`task`]: `run_worker`, the tokio task loop bridging `WorkerMessage`s
//!   to a `SimulationEngine`.

pub mod engine;
pub mod perf;
pub mod task;

pub use engine::SimulationEngine;
pub use perf::PerfSampler;
pub use task::{run_worker, RenderBufferBinding};
