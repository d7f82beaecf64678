//! Fab lifecycle state machine (spec.md §5/§6): drives the `INIT -> READY ->
//! RUNNING <-> PAUSED -> DISPOSED` transitions a fab's owning worker walks it
//! through, rejecting control signals that don't apply in the current state.

use railsim_common::error::EngineError;

/// A fab's lifecycle state. `Error` is terminal and only reachable from a
/// fatal init failure (spec.md §7); `Disposed` is terminal and reachable
/// only via `Dispose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabState {
    Uninitialized,
    Initialized,
    Running,
    Paused,
    Disposed,
    Error,
}

/// The control signals a fab's state machine responds to — the single-fab
/// subset of `WorkerMessage` (spec.md §6) that changes lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Init,
    Start,
    Stop,
    Pause,
    Resume,
    Dispose,
    Fail,
}

impl FabState {
    /// Applies `signal`, returning the resulting state or rejecting the
    /// transition. `PAUSE` halts the tick loop without touching memory
    /// (§5); `DISPOSE` is accepted from any state but `Disposed` itself, so
    /// a fab can always be torn down.
    pub fn apply(self, signal: ControlSignal) -> Result<FabState, EngineError> {
        use ControlSignal::*;
        use FabState::*;

        if self == Disposed {
            return Err(EngineError::CommandRejected {
                reason: "fab is disposed".into(),
            });
        }

        match (self, signal) {
            (_, Fail) => Ok(Error),
            (_, Dispose) => Ok(Disposed),
            (Uninitialized, Init) => Ok(Initialized),
            (Initialized, Start) => Ok(Running),
            (Running, Stop) => Ok(Initialized),
            (Running, Pause) => Ok(Paused),
            (Paused, Resume) => Ok(Running),
            (Paused, Stop) => Ok(Initialized),
            (state, signal) => Err(EngineError::CommandRejected {
                reason: format!("signal {signal:?} not valid in state {state:?}"),
            }),
        }
    }

    /// Whether the per-tick pipeline should run this tick.
    pub fn is_steppable(self) -> bool {
        matches!(self, FabState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControlSignal::*;
    use FabState::*;

    #[test]
    fn happy_path_walks_init_start_pause_resume_dispose() {
        let s = Uninitialized;
        let s = s.apply(Init).unwrap();
        assert_eq!(s, Initialized);
        let s = s.apply(Start).unwrap();
        assert_eq!(s, Running);
        assert!(s.is_steppable());
        let s = s.apply(Pause).unwrap();
        assert_eq!(s, Paused);
        assert!(!s.is_steppable());
        let s = s.apply(Resume).unwrap();
        assert_eq!(s, Running);
        let s = s.apply(Dispose).unwrap();
        assert_eq!(s, Disposed);
    }

    #[test]
    fn start_before_init_is_rejected() {
        assert!(Uninitialized.apply(Start).is_err());
    }

    #[test]
    fn disposed_rejects_every_further_signal() {
        assert!(Disposed.apply(Start).is_err());
        assert!(Disposed.apply(Dispose).is_err());
    }

    #[test]
    fn fail_is_accepted_from_any_live_state() {
        assert_eq!(Uninitialized.apply(Fail).unwrap(), Error);
        assert_eq!(Running.apply(Fail).unwrap(), Error);
    }

    #[test]
    fn stop_returns_to_initialized_from_running_or_paused() {
        assert_eq!(Running.apply(Stop).unwrap(), Initialized);
        assert_eq!(Paused.apply(Stop).unwrap(), Initialized);
    }
}
