//! Idle monitor state machine

use serde::Serialize;
use tracing::debug;

use super::config::MonitorConfig;

/// Result of evaluating one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The poll arrived late; the host was busy
    Busy,
    /// On time, but not enough consecutive on-time polls yet
    OnTime { consecutive: u32 },
    /// On time and at or past the idle threshold
    Idle { consecutive: u32 },
}

impl PollOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, PollOutcome::Idle { .. })
    }
}

/// Counters for the monitor
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub polls: u64,
    pub busy_polls: u64,
    pub idle_signals: u64,
    pub activity_resets: u64,
    pub max_gap_ms: u64,
}

/// Infers idleness from the latency of a repeating poll
#[derive(Debug, Clone)]
pub struct IdleMonitor {
    config: MonitorConfig,
    last_poll: u64,
    consecutive_on_time: u32,
    idle: bool,
    stats: MonitorStats,
}

impl IdleMonitor {
    /// Create a monitor whose first poll is measured from `now_ms`
    pub fn new(config: MonitorConfig, now_ms: u64) -> Self {
        debug!(?config, now_ms, "IdleMonitor::new: called");
        Self {
            config,
            last_poll: now_ms,
            consecutive_on_time: 0,
            idle: false,
            stats: MonitorStats::default(),
        }
    }

    /// Evaluate a poll that fired at `now_ms`
    pub fn poll(&mut self, now_ms: u64) -> PollOutcome {
        let gap = now_ms.saturating_sub(self.last_poll);
        self.stats.polls += 1;
        self.stats.max_gap_ms = self.stats.max_gap_ms.max(gap);
        // The poll is re-armed right away, so the next gap is measured from here
        self.last_poll = now_ms;

        if gap > self.config.late_after_ms() {
            debug!(gap, late_after = self.config.late_after_ms(), "IdleMonitor::poll: late, host busy");
            self.consecutive_on_time = 0;
            self.idle = false;
            self.stats.busy_polls += 1;
            return PollOutcome::Busy;
        }

        self.consecutive_on_time = self.consecutive_on_time.saturating_add(1);

        if self.consecutive_on_time >= self.config.idle_threshold {
            if !self.idle {
                debug!(consecutive = self.consecutive_on_time, "IdleMonitor::poll: idle confirmed");
            }
            self.idle = true;
            self.stats.idle_signals += 1;
            PollOutcome::Idle {
                consecutive: self.consecutive_on_time,
            }
        } else {
            PollOutcome::OnTime {
                consecutive: self.consecutive_on_time,
            }
        }
    }

    /// The poll timer was re-armed at `now_ms` after the idle work ran
    ///
    /// Time spent on idle work is not counted against the next poll.
    pub fn rearmed(&mut self, now_ms: u64) {
        self.last_poll = self.last_poll.max(now_ms);
    }

    /// Host activity was observed; start counting again
    pub fn reset_activity(&mut self) {
        debug!(consecutive = self.consecutive_on_time, "IdleMonitor::reset_activity: called");
        self.consecutive_on_time = 0;
        self.idle = false;
        self.stats.activity_resets += 1;
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn consecutive_on_time(&self) -> u32 {
        self.consecutive_on_time
    }

    pub fn last_poll(&self) -> u64 {
        self.last_poll
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Replace the configuration; applies from the next poll on
    pub fn set_config(&mut self, config: MonitorConfig) {
        debug!(?config, "IdleMonitor::set_config: called");
        self.config = config;
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }
}
