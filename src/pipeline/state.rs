//! Watch loop state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of the watch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchState {
    #[default]
    Running,
    ShuttingDown,
    Terminated,
}

/// State machine for tracking the loop and what it has processed.
#[derive(Debug, Clone, Default)]
pub struct WatchStateMachine {
    state: WatchState,
    stats: WatchStats,
}

impl WatchStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn transition(&mut self, new_state: WatchState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    pub fn record_line(&mut self) {
        self.stats.lines = self.stats.lines.saturating_add(1);
    }

    pub fn record_oversized(&mut self) {
        self.stats.oversized = self.stats.oversized.saturating_add(1);
    }

    pub fn record_match(&mut self) {
        self.stats.matches = self.stats.matches.saturating_add(1);
    }

    pub fn record_delivery(&mut self, delivered: bool) {
        if delivered {
            self.stats.delivered = self.stats.delivered.saturating_add(1);
        } else {
            self.stats.failed = self.stats.failed.saturating_add(1);
        }
    }

    pub fn record_rotation(&mut self) {
        self.stats.rotations = self.stats.rotations.saturating_add(1);
    }

    #[must_use]
    pub fn stats(&self) -> WatchStats {
        self.stats
    }
}

/// Counters for one watch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatchStats {
    pub lines: usize,
    pub oversized: usize,
    pub matches: usize,
    pub delivered: usize,
    /// Matches rejected by the endpoint or given up on after retries.
    pub failed: usize,
    pub rotations: usize,
}
