//! Autosave scheduler.
//!
//! `Idle → Armed(deadline) → Firing → Idle`. Every mutation while idle or
//! armed moves the deadline to `now + quiet`, so a burst of edits yields one
//! save after the burst ends. Time is passed in by the caller; nothing here
//! reads a clock.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveState {
    Idle,
    Armed { deadline: Instant },
    /// A save is in flight. Mutations arriving now re-arm after completion.
    Firing { rearm: bool },
}

#[derive(Debug, Clone)]
pub struct AutosaveScheduler {
    quiet: Duration,
    state: AutosaveState,
}

impl AutosaveScheduler {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, state: AutosaveState::Idle }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    pub fn state(&self) -> AutosaveState {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            AutosaveState::Armed { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// The document became (or stayed) dirty at `now`.
    pub fn on_mutation(&mut self, now: Instant) {
        self.state = match self.state {
            AutosaveState::Idle | AutosaveState::Armed { .. } => {
                AutosaveState::Armed { deadline: now + self.quiet }
            }
            AutosaveState::Firing { .. } => AutosaveState::Firing { rearm: true },
        };
    }

    /// Returns true exactly once per expiry, moving to `Firing`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            AutosaveState::Armed { deadline } if now >= deadline => {
                self.state = AutosaveState::Firing { rearm: false };
                true
            }
            _ => false,
        }
    }

    /// The save triggered by `poll` finished (either way). Mutations seen
    /// while firing start a fresh quiet period from `now`.
    pub fn complete(&mut self, now: Instant) {
        if let AutosaveState::Firing { rearm } = self.state {
            self.state = if rearm {
                AutosaveState::Armed { deadline: now + self.quiet }
            } else {
                AutosaveState::Idle
            };
        }
    }

    /// Drop any pending deadline (document replaced, or saved explicitly).
    pub fn cancel(&mut self) {
        if let AutosaveState::Armed { .. } = self.state {
            self.state = AutosaveState::Idle;
        }
    }
}
