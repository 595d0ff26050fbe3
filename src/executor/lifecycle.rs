//! Component lifecycle state machine.
//!
//! ```text
//! NEW ─▶ INITIALIZING ─▶ INITIALIZED ─▶ STARTING ─▶ STARTED
//!                                          ▲           │
//!                                          │           ▼
//!                    DESTROYED ◀─ DESTROYING ◀─ STOPPED ◀─ STOPPING
//!
//! FAILED is entered when a transition errors; only stop/destroy leave it.
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Lifecycle states of an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    New,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
    Destroying,
    Destroyed,
    Failed,
}

impl LifecycleState {
    /// States from which `start` is legal. `Stopped` allows a restart.
    pub fn can_start(self) -> bool {
        matches!(
            self,
            LifecycleState::New | LifecycleState::Initialized | LifecycleState::Stopped
        )
    }

    /// States in which `stop` has running resources to release.
    pub fn needs_stop(self) -> bool {
        matches!(
            self,
            LifecycleState::Starting | LifecycleState::Started | LifecycleState::Failed
        )
    }

    /// States in which configuration may be replaced.
    pub fn is_configurable(self) -> bool {
        matches!(
            self,
            LifecycleState::New | LifecycleState::Initialized | LifecycleState::Stopped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::New => "NEW",
            LifecycleState::Initializing => "INITIALIZING",
            LifecycleState::Initialized => "INITIALIZED",
            LifecycleState::Starting => "STARTING",
            LifecycleState::Started => "STARTED",
            LifecycleState::Stopping => "STOPPING",
            LifecycleState::Stopped => "STOPPED",
            LifecycleState::Destroying => "DESTROYING",
            LifecycleState::Destroyed => "DESTROYED",
            LifecycleState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current lifecycle state behind a mutex.
///
/// Transitions are made through [`LifecycleGuard`], which keeps the lock for
/// the whole multi-step transition so concurrent start/stop calls serialize.
#[derive(Debug)]
pub struct Lifecycle {
    component: String,
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: Mutex::new(LifecycleState::New),
        }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state for a transition.
    pub fn lock(&self) -> LifecycleGuard<'_> {
        LifecycleGuard {
            component: &self.component,
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Exclusive access to a [`Lifecycle`] during a transition.
pub struct LifecycleGuard<'a> {
    component: &'a str,
    state: MutexGuard<'a, LifecycleState>,
}

impl LifecycleGuard<'_> {
    #[inline]
    pub fn state(&self) -> LifecycleState {
        *self.state
    }

    /// Move to `next`.
    pub fn set(&mut self, next: LifecycleState) {
        tracing::debug!(
            component = %self.component,
            from = %*self.state,
            to = %next,
            "lifecycle transition"
        );
        *self.state = next;
    }
}
