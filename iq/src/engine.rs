//! Engine - the idle monitor and the task scheduler on one timer
//!
//! The engine arms the monitor's poll, pulls due timers and dispatches them:
//! polls go to the [`IdleMonitor`], label timers to the [`TaskScheduler`]. When
//! a poll confirms idleness the configured [`IdleAction`] runs.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, ManualClock};
use crate::config::Config;
use crate::monitor::{IdleMonitor, MonitorConfig, MonitorStats, PollOutcome};
use crate::scheduler::{FlushReport, SchedulerError, SchedulerStats, TaskScheduler};
use crate::timer::{DEFAULT_FRAME_PERIOD_MS, Pacing, Timer, TimerDriver, TimerEvent, TimerHandle, TimerQueue};

/// What to do with queued work once idle is confirmed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleAction {
    /// Execute pending batches, then remove every record
    #[default]
    Flush,
    /// Execute pending batches and reset their intervals, keeping the records
    Drain,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(rename = "idle-action", default)]
    pub idle_action: IdleAction,

    /// Frame period for frame-paced timers; unset or zero disables frame pacing
    #[serde(rename = "frame-period-ms", default = "default_frame_period_ms")]
    pub frame_period_ms: Option<u64>,
}

fn default_frame_period_ms() -> Option<u64> {
    Some(DEFAULT_FRAME_PERIOD_MS)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_action: IdleAction::Flush,
            frame_period_ms: default_frame_period_ms(),
        }
    }
}

/// What one call to [`Engine::run_due`] did
#[derive(Debug, Default)]
pub struct DueReport {
    /// Poll outcomes, in firing order
    pub polls: Vec<PollOutcome>,
    /// Labels whose batch ran because their timer fired
    pub executed: Vec<String>,
    /// Result of the idle action, if idle was confirmed
    pub idle: Vec<FlushReport>,
    /// Callback failures from timer-fired batches
    pub failures: Vec<SchedulerError>,
}

impl DueReport {
    pub fn is_empty(&self) -> bool {
        self.polls.is_empty() && self.executed.is_empty() && self.idle.is_empty() && self.failures.is_empty()
    }

    /// Callback failures from fired batches and idle flushes alike
    pub fn all_failures(&self) -> impl Iterator<Item = &SchedulerError> {
        self.failures.iter().chain(self.idle.iter().flat_map(|r| r.failures.iter()))
    }
}

/// Combined counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub monitor: MonitorStats,
    pub scheduler: SchedulerStats,
    pub idle_actions: u64,
}

/// Idle monitor plus task scheduler sharing one clock and timer
pub struct Engine<C, T> {
    scheduler: TaskScheduler<C, T>,
    monitor: IdleMonitor,
    poll_timer: Option<TimerHandle>,
    idle_action: IdleAction,
    idle_actions: u64,
}

impl<C: Clock> Engine<C, TimerQueue> {
    /// Build an engine with a [`TimerQueue`] configured from `config`
    pub fn from_config(config: &Config, clock: C) -> Self {
        let timer = TimerQueue::with_frame_period(config.engine.frame_period_ms);
        Self::new(config, clock, timer)
    }
}

impl<C: Clock, T: TimerDriver> Engine<C, T> {
    /// Create an engine and arm the first poll
    pub fn new(config: &Config, clock: C, timer: T) -> Self {
        debug!(profile = %config.profile, "Engine::new: called");
        let now = clock.now_ms();
        let monitor = IdleMonitor::new(config.monitor.clone(), now);
        let scheduler = TaskScheduler::new(config.scheduler.clone(), clock, timer);

        let mut engine = Self {
            scheduler,
            monitor,
            poll_timer: None,
            idle_action: config.engine.idle_action,
            idle_actions: 0,
        };
        engine.arm_poll();
        engine
    }

    fn arm_poll(&mut self) {
        let now = self.scheduler.clock().now_ms();
        // Fixed even when frames are available: frame-aligned gaps would always read as late.
        // A zero tick would re-fire forever within one run_due
        let tick = self.monitor.config().tick_ms.max(1);
        let handle = self
            .scheduler
            .timer_mut()
            .schedule(now, tick, Pacing::Fixed, TimerEvent::Poll);
        self.poll_timer = Some(handle);
        self.monitor.rearmed(now);
    }

    /// Dispatch every timer due by now
    pub fn run_due(&mut self) -> DueReport {
        let mut report = DueReport::default();
        let now = self.scheduler.clock().now_ms();

        while let Some(fired) = self.scheduler.timer_mut().pop_due(now) {
            match fired.event {
                TimerEvent::Poll => self.on_poll(fired.handle, &mut report),
                TimerEvent::Execute(label) => match self.scheduler.timer_fired(&label, fired.handle) {
                    Ok(true) => report.executed.push(label),
                    Ok(false) => {}
                    Err(SchedulerError::UnknownLabel(label)) => {
                        debug!(%label, "Engine::run_due: timer for flushed label");
                    }
                    Err(e) => {
                        warn!(%label, error = %e, "Deferred batch failed");
                        report.executed.push(label);
                        report.failures.push(e);
                    }
                },
            }
        }

        report
    }

    fn on_poll(&mut self, handle: TimerHandle, report: &mut DueReport) {
        if self.poll_timer != Some(handle) {
            debug!(%handle, "Engine::on_poll: superseded poll");
            return;
        }
        self.poll_timer = None;

        let now = self.scheduler.clock().now_ms();
        let outcome = self.monitor.poll(now);
        report.polls.push(outcome);

        if outcome.is_idle() {
            let flushed = self.run_idle_action();
            if !flushed.is_empty() {
                report.idle.push(flushed);
            }
        }

        self.arm_poll();
    }

    fn run_idle_action(&mut self) -> FlushReport {
        self.idle_actions += 1;
        match self.idle_action {
            IdleAction::Flush => self.scheduler.flush_all(),
            IdleAction::Drain => self.scheduler.drain_idle(),
        }
    }

    /// Host activity was observed
    pub fn reset_activity(&mut self) {
        self.monitor.reset_activity();
    }

    pub fn is_idle(&self) -> bool {
        self.monitor.is_idle()
    }

    /// Earliest armed deadline, in clock milliseconds
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.timer().next_deadline()
    }

    pub fn scheduler(&self) -> &TaskScheduler<C, T> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TaskScheduler<C, T> {
        &mut self.scheduler
    }

    pub fn monitor(&self) -> &IdleMonitor {
        &self.monitor
    }

    /// Replace the monitor configuration; the already armed poll keeps its deadline
    pub fn set_monitor_config(&mut self, config: MonitorConfig) {
        self.monitor.set_config(config);
    }

    pub fn set_idle_action(&mut self, idle_action: IdleAction) {
        debug!(?idle_action, "Engine::set_idle_action: called");
        self.idle_action = idle_action;
    }

    pub fn idle_action(&self) -> IdleAction {
        self.idle_action
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            monitor: self.monitor.stats().clone(),
            scheduler: self.scheduler.stats().clone(),
            idle_actions: self.idle_actions,
        }
    }
}

impl<T: TimerDriver> Engine<ManualClock, T> {
    /// Step a hand-driven clock from deadline to deadline up to `target_ms`
    pub fn run_until(&mut self, target_ms: u64) -> Vec<(u64, DueReport)> {
        let clock = self.scheduler.clock().clone();
        let mut reports = Vec::new();

        while let Some(deadline) = self.next_deadline() {
            if deadline > target_ms {
                break;
            }
            clock.set(deadline);
            let report = self.run_due();
            if !report.is_empty() {
                reports.push((clock.now_ms(), report));
            }
        }

        clock.set(target_ms);
        reports
    }
}
