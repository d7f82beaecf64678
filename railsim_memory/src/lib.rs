//! # railsim shared-buffer foundation
//!
//! Anonymous-mmap-backed regions for the simulator's per-fab vehicle,
//! sensor, path and render byte arrays, plus the [`layout::MemoryLayoutManager`]
//! that carves them. Unlike a cross-process shared-memory service, every
//! region here is allocated and owned in-process by the worker thread that
//! uses it — there is no named-segment discovery, no PID-keyed cleanup, and
//! no multi-process lifecycle to manage. The one region with a genuine
//! concurrent reader (the render buffer, polled by a renderer outside the
//! tick loop) keeps an even/odd version counter for callers that want a
//! torn-read guarantee; everything else is read unsynchronized by design,
//! since regions are writer-disjoint per fab and one-frame-stale pose data
//! is acceptable.
//!
//! ## Module overview
//!
//! - [`segment`]: the `SharedRegion` anonymous-mmap primitive and its
//!   cache-line alignment helpers.
//! - [`version`]: the even/odd `VersionCounter` used by the render buffer.
//! - [`render`]: `RenderBuffer`, the one region with an optional
//!   consistency-checked read path.
//! - [`layout`]: `MemoryLayoutManager`, computing per-fab region offsets,
//!   worker assignment, and the continuous render layout.
//! - [`error`]: `MemError`/`MemResult`.

#![warn(clippy::all)]

pub mod consts;
pub mod error;
pub mod layout;
pub mod render;
pub mod segment;
pub mod version;

pub use error::{MemError, MemResult};
pub use layout::{
    FabAllocation, FabRegion, FabSpec, MemoryLayoutManager, RenderLayout, RenderSections, WorkerAssignment,
};
pub use render::RenderBuffer;
pub use segment::SharedRegion;
pub use version::VersionCounter;

/// Initialize the global `tracing` subscriber. Mirrors the reference's
/// `init_tracing` helper; callers (the `railsim` binary) invoke this once
/// at startup rather than each crate initializing its own subscriber.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .try_init();
}
