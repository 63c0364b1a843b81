//! Scripted, deterministic engine runs on a [`ManualClock`]
//!
//! The script exercises each behaviour once: a debounced search box, a queued
//! log writer, a slow indexer that forces backoff, a failing sync and a burst
//! of user activity that holds off the idle flush.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::clock::{Clock, ManualClock};
use crate::config::{Config, Profile};
use crate::engine::{DueReport, Engine, EngineStats};
use crate::monitor::PollOutcome;
use crate::scheduler::{Callback, LongTaskHooks, ScheduleOptions, TaskSnapshot};
use crate::timer::TimerQueue;

/// What a timeline entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Scheduled,
    Executed,
    Failed,
    Working,
    Finished,
    Busy,
    Idle,
    Flushed,
    Activity,
}

impl std::fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scheduled => "scheduled",
            Self::Executed => "executed",
            Self::Failed => "failed",
            Self::Working => "working",
            Self::Finished => "finished",
            Self::Busy => "busy",
            Self::Idle => "idle",
            Self::Flushed => "flushed",
            Self::Activity => "activity",
        };
        write!(f, "{name}")
    }
}

/// One line of the simulated timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub at_ms: u64,
    pub kind: TimelineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub detail: String,
}

impl TimelineEntry {
    fn new(at_ms: u64, kind: TimelineKind, label: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            at_ms,
            kind,
            label: label.map(str::to_string),
            detail: detail.into(),
        }
    }
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub profile: Profile,
    pub duration_ms: u64,
    /// Clock reading at the end; slow callbacks can push it past `duration_ms`
    pub ended_ms: u64,
    pub timeline: Vec<TimelineEntry>,
    pub stats: EngineStats,
    pub tasks: Vec<TaskSnapshot>,
}

impl SimulationReport {
    /// Entries of one kind, optionally for one label
    pub fn entries(&self, kind: TimelineKind, label: Option<&str>) -> Vec<&TimelineEntry> {
        self.timeline
            .iter()
            .filter(|e| e.kind == kind && (label.is_none() || e.label.as_deref() == label))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Type(&'static str),
    Log(&'static str),
    Index,
    Sync,
    Activity,
}

const SCRIPT: &[(u64, Step)] = &[
    (0, Step::Activity),
    (0, Step::Type("r")),
    (0, Step::Log("boot")),
    (40, Step::Type("ru")),
    (40, Step::Log("connected")),
    (80, Step::Type("rus")),
    (120, Step::Index),
    (200, Step::Activity),
    (200, Step::Sync),
    (400, Step::Activity),
    (400, Step::Log("saved")),
    (700, Step::Index),
];

#[derive(Debug, Clone, Default)]
struct Timeline(Arc<Mutex<Vec<TimelineEntry>>>);

impl Timeline {
    fn push(&self, entry: TimelineEntry) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(entry);
        }
    }

    fn entries(&self) -> Vec<TimelineEntry> {
        self.0.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

struct TimelineHooks {
    timeline: Timeline,
    clock: ManualClock,
}

impl LongTaskHooks for TimelineHooks {
    fn working(&self, label: &str) {
        self.timeline.push(TimelineEntry::new(
            self.clock.now_ms(),
            TimelineKind::Working,
            Some(label),
            "potentially long-running task",
        ));
    }

    fn finished(&self, label: &str, duration_ms: u64) {
        self.timeline.push(TimelineEntry::new(
            self.clock.now_ms(),
            TimelineKind::Finished,
            Some(label),
            format!("took {duration_ms}ms, interval widened"),
        ));
    }
}

/// A scripted workload against one configuration
pub struct Simulation {
    config: Config,
    duration_ms: u64,
}

impl Simulation {
    pub fn new(config: Config, duration_ms: u64) -> Self {
        Self { config, duration_ms }
    }

    pub fn run(&self) -> SimulationReport {
        debug!(profile = %self.config.profile, duration_ms = self.duration_ms, "Simulation::run: called");
        let clock = ManualClock::new(0);
        let timeline = Timeline::default();

        let mut engine = Engine::from_config(&self.config, clock.clone());
        engine.scheduler_mut().set_hooks(Box::new(TimelineHooks {
            timeline: timeline.clone(),
            clock: clock.clone(),
        }));

        // Slow enough to overrun the default window
        let slow_ms = self.config.scheduler.default_interval_ms.saturating_mul(2);
        let mut idle = false;

        for &(at, step) in SCRIPT {
            if at > self.duration_ms {
                break;
            }
            record_reports(&timeline, &mut idle, engine.run_until(at));
            apply(&mut engine, &clock, &timeline, step, slow_ms);
        }
        record_reports(&timeline, &mut idle, engine.run_until(self.duration_ms));

        let mut entries = timeline.entries();
        entries.sort_by_key(|e| e.at_ms);

        SimulationReport {
            profile: self.config.profile,
            duration_ms: self.duration_ms,
            ended_ms: clock.now_ms(),
            timeline: entries,
            stats: engine.stats(),
            tasks: engine.scheduler().tasks(),
        }
    }
}

fn executed(timeline: &Timeline, clock: &ManualClock, label: &'static str, detail: String) -> Callback {
    let timeline = timeline.clone();
    let clock = clock.clone();
    Box::new(move || {
        timeline.push(TimelineEntry::new(clock.now_ms(), TimelineKind::Executed, Some(label), detail));
        Ok(())
    })
}

fn apply(engine: &mut Engine<ManualClock, TimerQueue>, clock: &ManualClock, timeline: &Timeline, step: Step, slow_ms: u64) {
    let now = clock.now_ms();
    let (label, detail, options, callback): (&str, String, ScheduleOptions, Callback) = match step {
        Step::Activity => {
            engine.reset_activity();
            timeline.push(TimelineEntry::new(now, TimelineKind::Activity, None, "input observed"));
            return;
        }
        Step::Type(query) => (
            "search",
            format!("query '{query}'"),
            ScheduleOptions::debounce(),
            executed(timeline, clock, "search", format!("searched '{query}'")),
        ),
        Step::Log(line) => (
            "log",
            format!("line '{line}'"),
            ScheduleOptions::queued(),
            executed(timeline, clock, "log", format!("wrote '{line}'")),
        ),
        Step::Index => {
            let timeline = timeline.clone();
            let clock = clock.clone();
            let callback: Callback = Box::new(move || {
                timeline.push(TimelineEntry::new(
                    clock.now_ms(),
                    TimelineKind::Executed,
                    Some("index"),
                    format!("rebuilding for {slow_ms}ms"),
                ));
                clock.advance(slow_ms);
                Ok(())
            });
            ("index", "rebuild".to_string(), ScheduleOptions::debounce(), callback)
        }
        Step::Sync => {
            let callback: Callback = Box::new(|| Err(eyre::eyre!("remote unreachable")));
            ("sync", "push changes".to_string(), ScheduleOptions::debounce(), callback)
        }
    };

    let snapshot = engine.scheduler_mut().schedule_boxed(label, callback, options);
    timeline.push(TimelineEntry::new(
        now,
        TimelineKind::Scheduled,
        Some(label),
        format!("{detail} ({} pending, window {}ms)", snapshot.pending, snapshot.interval_ms),
    ));
}

fn record_reports(timeline: &Timeline, idle: &mut bool, reports: Vec<(u64, DueReport)>) {
    for (at, report) in reports {
        for outcome in &report.polls {
            match outcome {
                PollOutcome::Busy => {
                    *idle = false;
                    timeline.push(TimelineEntry::new(at, TimelineKind::Busy, None, "poll fired late"));
                }
                PollOutcome::OnTime { .. } => *idle = false,
                PollOutcome::Idle { consecutive } => {
                    if !*idle {
                        timeline.push(TimelineEntry::new(
                            at,
                            TimelineKind::Idle,
                            None,
                            format!("{consecutive} on-time polls"),
                        ));
                    }
                    *idle = true;
                }
            }
        }

        for flushed in &report.idle {
            timeline.push(TimelineEntry::new(
                at,
                TimelineKind::Flushed,
                None,
                format!(
                    "ran {} pending batch(es), removed {} record(s)",
                    flushed.executed.len(),
                    flushed.records.len()
                ),
            ));
        }

        for failure in report.all_failures() {
            timeline.push(TimelineEntry::new(at, TimelineKind::Failed, failure.label(), failure.to_string()));
        }
    }
}
