//! The engine-wide error sum type.
//!
//! Converts the ad-hoc `console.warn` + silent-drop pattern of the source
//! system into a single typed enum. Fatal variants propagate out of
//! `FabContext::init` to the orchestrator; non-fatal variants are logged via
//! `tracing::warn!` and discarded at the point of use — they never unwind
//! past a single vehicle's per-tick processing.

use thiserror::Error;

/// Sum of all error conditions the engine can produce.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Unrecoverable initialization failure: missing/malformed map, zero
    /// edges, or shared-region over-allocation. Surfaces as `ERROR` and the
    /// fab never reaches `READY`.
    #[error("fatal initialization error: {0}")]
    FatalInit(String),

    /// A referenced edge index was not found in `[1, edges.len()]`.
    #[error("missing edge index {0}")]
    MissingEdge(u32),

    /// A referenced node name was not found in the name->index map.
    #[error("missing node: {0}")]
    MissingNode(String),

    /// An edge transition was attempted where `prev.to_node != next.from_node`.
    /// Non-fatal: emitted as data (`UNUSUAL_MOVE`), the tick continues.
    #[error("unusual move: {prev_edge} -> {next_edge} at ({x}, {y})")]
    UnusualMove {
        prev_edge: String,
        next_edge: String,
        x: f32,
        y: f32,
    },

    /// An external command was malformed or referenced an unknown vehicle/fab.
    #[error("command rejected: {reason}")]
    CommandRejected { reason: String },
}

impl EngineError {
    /// Whether this variant should abort fab initialization / propagate to
    /// the orchestrator as `ERROR`, as opposed to being logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::FatalInit(_))
    }
}
