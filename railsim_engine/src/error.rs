//! Engine-local error alias.
//!
//! `railsim_engine` produces no error variants of its own — every failure
//! mode a fab can hit (fatal init, missing edge/node, unusual move, command
//! rejection) is already enumerated by [`railsim_common::error::EngineError`].
//! This module just re-exports it under the name engine code reaches for.

pub use railsim_common::error::EngineError;

/// Convenience alias used throughout `railsim_engine`.
pub type EngineResult<T> = Result<T, EngineError>;
