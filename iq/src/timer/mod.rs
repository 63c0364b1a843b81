//! Deferred-execution timer primitive
//!
//! The scheduler and idle monitor never run callbacks from inside the timer.
//! Instead they arm a timer with a [`TimerEvent`] describing what should
//! happen, and whoever drives the timer ([`TimerDriver`]) dispatches the event
//! when it comes due.

mod queue;

use serde::{Deserialize, Serialize};

pub use queue::{DEFAULT_FRAME_PERIOD_MS, TimerQueue};

/// Opaque handle to an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub(crate) u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// How a timer's deadline is derived from its delay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Fire after exactly `delay` milliseconds
    Fixed,
    /// Fire on the first frame boundary at or after `delay`
    #[default]
    Frame,
}

/// What a timer does when it fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// The idle monitor's self-rearming poll
    Poll,
    /// Execute the pending batch for a label
    Execute(String),
}

/// A timer that came due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    pub handle: TimerHandle,
    pub deadline: u64,
    pub event: TimerEvent,
}

/// Arm and cancel deferred timers
pub trait Timer {
    /// Arm a timer relative to `now_ms`
    fn schedule(&mut self, now_ms: u64, delay_ms: u64, pacing: Pacing, event: TimerEvent) -> TimerHandle;

    /// Cancel an armed timer; returns false if it already fired or was cancelled
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    /// Whether [`Pacing::Frame`] is honoured; callers fall back to fixed delays otherwise
    fn supports_frame_pacing(&self) -> bool {
        false
    }
}

/// A timer whose due events are pulled by an external loop
pub trait TimerDriver: Timer {
    /// Remove and return the earliest timer due at or before `now_ms`
    fn pop_due(&mut self, now_ms: u64) -> Option<Fired>;

    /// Deadline of the earliest armed timer
    fn next_deadline(&self) -> Option<u64>;

    /// Number of armed timers
    fn armed(&self) -> usize;
}
