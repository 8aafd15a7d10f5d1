use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bootstrap states, in the only order they may be entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MainState {
    Created,
    Configured,
    RoutesAdded,
    AutoConfigured,
    Started,
    Stopped,
    /// A `start()` call aborted; the context never reached the running state
    Failed,
}

impl MainState {
    fn rank(self) -> u8 {
        match self {
            MainState::Created => 0,
            MainState::Configured => 1,
            MainState::RoutesAdded => 2,
            MainState::AutoConfigured => 3,
            MainState::Started => 4,
            MainState::Stopped => 5,
            MainState::Failed => 6,
        }
    }

    /// Whether `next` directly follows `self`
    pub fn can_transition_to(self, next: MainState) -> bool {
        match next {
            MainState::Failed => !matches!(self, MainState::Stopped | MainState::Failed),
            _ => next.rank() == self.rank() + 1 && self != MainState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MainState::Stopped | MainState::Failed)
    }
}

impl std::fmt::Display for MainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Records every state the bootstrapper passes through
#[derive(Debug, Clone)]
pub struct LifecycleTracker {
    current: MainState,
    history: Vec<MainState>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self {
            current: MainState::Created,
            history: vec![MainState::Created],
        }
    }

    pub fn current(&self) -> MainState {
        self.current
    }

    /// Every state entered so far, starting with `Created`
    pub fn history(&self) -> &[MainState] {
        &self.history
    }

    /// Move to `next`, returning false if the transition is out of order
    pub fn advance(&mut self, next: MainState) -> bool {
        if !self.current.can_transition_to(next) {
            return false;
        }
        tracing::debug!("Bootstrap state {} -> {}", self.current, next);
        self.current = next;
        self.history.push(next);
        true
    }
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared running flag for the routing context
#[derive(Debug, Clone)]
pub struct RunningFlag {
    state: Arc<AtomicBool>,
}

impl RunningFlag {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.state.store(running, Ordering::SeqCst);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}
