//! Render state machine and debounce timing.
//!
//! ```text
//! Idle      ── file change ──────► Scheduled   (every change restarts the window)
//! Scheduled ── debounce elapses ─► Compiling
//! Compiling ── success ──────────► Rendered
//! Compiling ── same hash ────────► Idle        (nothing repainted)
//! Compiling ── failure ──────────► Failed      (last paint kept)
//! Failed    ── retry ────────────► Compiling
//! Rendered  ── file change ──────► Scheduled
//! any       ── dev server on ────► Delegated ── off ──► Idle
//! ```
//!
//! The scheduler only decides *when* to compile; the engine does the work.
//! Time is passed in so tests can drive it with tokio's paused clock.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderState {
    Idle,
    /// A change is waiting for the debounce window to close.
    Scheduled,
    /// A compile request is in flight.
    Compiling,
    Rendered,
    /// Last compile failed; the previous paint is still shown.
    Failed,
    /// The frame shows an external dev server; local scheduling is suspended.
    Delegated,
}

#[derive(Debug)]
pub struct RenderScheduler {
    state: RenderState,
    debounce: Duration,
    deadline: Option<Instant>,
}

impl RenderScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: RenderState::Idle,
            debounce,
            deadline: None,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// When the pending compile should start, if one is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Arm (or re-arm) the debounce window. Ignored while delegated.
    pub fn file_changed(&mut self, now: Instant) -> bool {
        if self.state == RenderState::Delegated {
            return false;
        }
        self.state = RenderState::Scheduled;
        self.deadline = Some(now + self.debounce);
        true
    }

    /// Start the scheduled compile once its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if self.state == RenderState::Scheduled && now >= deadline => {
                self.begin();
                true
            }
            _ => false,
        }
    }

    /// Compile right away, dropping any pending deadline.
    ///
    /// Used for manual refresh and retry. Ignored while delegated.
    pub fn begin(&mut self) -> bool {
        if self.state == RenderState::Delegated {
            return false;
        }
        self.deadline = None;
        self.state = RenderState::Compiling;
        true
    }

    pub fn succeeded(&mut self) {
        self.settle(RenderState::Rendered);
    }

    /// The result matched what is already shown.
    pub fn skipped(&mut self) {
        self.settle(RenderState::Idle);
    }

    pub fn failed(&mut self) {
        self.settle(RenderState::Failed);
    }

    /// Retry after a failure.
    pub fn retry(&mut self) -> bool {
        self.state == RenderState::Failed && self.begin()
    }

    /// A document arrived that nobody here requested (cache restore, room
    /// push). It counts as rendered unless work is pending.
    pub fn adopt(&mut self) {
        if matches!(
            self.state,
            RenderState::Idle | RenderState::Rendered | RenderState::Failed
        ) {
            self.state = RenderState::Rendered;
        }
    }

    pub fn delegate(&mut self) {
        self.deadline = None;
        self.state = RenderState::Delegated;
    }

    pub fn undelegate(&mut self) {
        if self.state == RenderState::Delegated {
            self.state = RenderState::Idle;
        }
    }

    /// Results only land while compiling; a change that arrived meanwhile
    /// keeps its schedule.
    fn settle(&mut self, next: RenderState) {
        if self.state == RenderState::Compiling {
            self.state = next;
        }
    }
}
