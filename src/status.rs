//! Process-wide run-state snapshot.
//!
//! The controller owns the state machine; observers (the CLI, a UI) poll it
//! through a cloneable read-only [`StatusHandle`]. Run state is never
//! persisted: every process starts at [`RunState::Stopped`] regardless of
//! durable tracking intent.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Runtime state of the tracking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No sampling session exists
    Stopped,
    /// Start accepted, subscription being established
    Starting,
    /// Subscription established, samples expected
    Running,
}

impl RunState {
    fn as_u8(self) -> u8 {
        match self {
            RunState::Stopped => 0,
            RunState::Starting => 1,
            RunState::Running => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunState::Starting,
            2 => RunState::Running,
            _ => RunState::Stopped,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Stopped => write!(f, "stopped"),
            RunState::Starting => write!(f, "starting"),
            RunState::Running => write!(f, "running"),
        }
    }
}

/// Shared, read-only view of the controller's run state.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    state: Arc<AtomicU8>,
}

impl StatusHandle {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(RunState::Stopped.as_u8())),
        }
    }

    /// Only the controller transitions run state.
    pub(crate) fn set(&self, state: RunState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Current run state.
    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether a sampling session is established and live.
    pub fn is_active(&self) -> bool {
        self.run_state() == RunState::Running
    }
}
