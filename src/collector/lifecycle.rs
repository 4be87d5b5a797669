//! Lifecycle state machine: `running` → `stopping` → `stopped`

use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Tracks the current state and the timestamps of its transitions.
///
/// Transitions only move forward; requests to go backwards are ignored.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
    started_at_ms: i64,
    shutdown_started_at_ms: OnceLock<i64>,
}

impl Lifecycle {
    pub fn new(started_at_ms: i64) -> Self {
        let (state, _) = watch::channel(LifecycleState::Running);
        Self {
            state,
            started_at_ms,
            shutdown_started_at_ms: OnceLock::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    pub fn shutdown_started_at_ms(&self) -> Option<i64> {
        self.shutdown_started_at_ms.get().copied()
    }

    /// Move `running` → `stopping`.
    ///
    /// Returns `true` only for the call that performed the transition. The
    /// timestamp is recorded before `stopping` becomes visible to readers.
    pub fn begin_shutdown(&self, now_ms: i64) -> bool {
        self.state.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                let _ = self.shutdown_started_at_ms.set(now_ms);
                *state = LifecycleState::Stopping;
                true
            } else {
                false
            }
        })
    }

    /// Move to the terminal `stopped` state
    pub fn mark_stopped(&self) {
        self.state.send_if_modified(|state| {
            if *state == LifecycleState::Stopped {
                false
            } else {
                *state = LifecycleState::Stopped;
                true
            }
        });
    }
}
