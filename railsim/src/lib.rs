//! `railsim`'s orchestrator library: the `MultiWorkerController` supervisor
//! the `railsim` binary's `main.rs` drives (spec.md §5, §14). Split into a
//! library target, alongside the binary, so integration tests can exercise
//! the controller directly without spawning the CLI process.

pub mod controller;
