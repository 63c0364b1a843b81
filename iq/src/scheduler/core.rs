//! Scheduler implementation

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::timer::{Pacing, Timer, TimerEvent, TimerHandle};

use super::config::{FailurePolicy, SchedulerConfig};
use super::error::{CallbackError, SchedulerError, SchedulerResult};
use super::hooks::{LoggingHooks, LongTaskHooks};
use super::record::{Batch, Callback, FlushReport, ScheduleOptions, SchedulerStats, TaskRecord, TaskSnapshot};

/// Outcome of running a batch's callbacks
#[derive(Debug)]
pub struct BatchRun {
    pub ran: usize,
    pub failure: Option<SchedulerError>,
}

/// The TaskScheduler owns the label table and arms one timer per label.
///
/// All operations take `&mut self`: the scheduler assumes a single logical
/// execution context and does no locking of its own.
pub struct TaskScheduler<C, T> {
    config: SchedulerConfig,
    clock: C,
    timer: T,
    tasks: BTreeMap<String, TaskRecord>,
    hooks: Box<dyn LongTaskHooks>,
    stats: SchedulerStats,
}

impl<C: Clock, T: Timer> TaskScheduler<C, T> {
    /// Create a new scheduler with logging hooks
    pub fn new(config: SchedulerConfig, clock: C, timer: T) -> Self {
        debug!(?config, "TaskScheduler::new: called");
        Self {
            config,
            clock,
            timer,
            tasks: BTreeMap::new(),
            hooks: Box::new(LoggingHooks),
            stats: SchedulerStats::default(),
        }
    }

    /// Replace the long-task hooks
    pub fn with_hooks(mut self, hooks: impl LongTaskHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn LongTaskHooks>) {
        self.hooks = hooks;
    }

    /// Defer `callback` under `label`, (re-)arming the label's timer
    pub fn schedule_task<F>(&mut self, label: &str, callback: F, options: ScheduleOptions) -> TaskSnapshot
    where
        F: FnOnce() -> Result<(), CallbackError> + Send + 'static,
    {
        self.schedule_boxed(label, Box::new(callback), options)
    }

    /// [`schedule_task`](Self::schedule_task) for an already boxed callback
    pub fn schedule_boxed(&mut self, label: &str, callback: Callback, options: ScheduleOptions) -> TaskSnapshot {
        let now = self.clock.now_ms();
        debug!(%label, ?options, now, "TaskScheduler::schedule_task: called");
        self.stats.total_scheduled += 1;

        let pacing = match options.pacing {
            Pacing::Frame if !self.timer.supports_frame_pacing() => Pacing::Fixed,
            pacing => pacing,
        };
        let default_interval = self.config.default_interval_ms;

        let record = match self.tasks.entry(label.to_string()) {
            Entry::Occupied(entry) => {
                debug!(%label, "TaskScheduler::schedule_task: existing label");
                let record = entry.into_mut();
                if let Some(previous) = record.timer.take() {
                    let stale = now.saturating_sub(record.start_ms) > record.interval_ms;
                    debug!(%label, %previous, stale, "TaskScheduler::schedule_task: cancelling previous timer");
                    self.timer.cancel(previous);
                }

                if record.queue_mode {
                    self.stats.total_coalesced += 1;
                } else {
                    if record.has_pending() {
                        self.stats.total_debounced += 1;
                    }
                    record.callbacks.clear();
                }
                record.callbacks.push_back(callback);
                record
            }
            Entry::Vacant(entry) => {
                debug!(%label, default_interval, "TaskScheduler::schedule_task: new label");
                self.stats.tasks_created += 1;
                let queue = options.queue.unwrap_or(self.config.default_queue);
                let mut record = TaskRecord::new(label, default_interval, queue, pacing, now);
                record.callbacks.push_back(callback);
                entry.insert(record)
            }
        };

        let handle = self.timer.schedule(
            now,
            record.interval_ms,
            record.pacing,
            TimerEvent::Execute(label.to_string()),
        );
        record.timer = Some(handle);
        self.stats.peak_pending = self.stats.peak_pending.max(record.pending());

        record.snapshot()
    }

    /// Run and clear the pending batch for `label`
    ///
    /// Returns `Ok(false)` when nothing is pending.
    pub fn execute_tasks(&mut self, label: &str) -> SchedulerResult<bool> {
        debug!(%label, "TaskScheduler::execute_tasks: called");
        let Some(batch) = self.take_batch(label)? else {
            debug!(%label, "TaskScheduler::execute_tasks: nothing pending");
            return Ok(false);
        };
        let run = batch_run(batch.label.clone(), batch.callbacks, self.config.failure_policy);
        self.finish_batch(label, batch.started_ms, run)
    }

    /// Take ownership of the pending callbacks for `label`
    ///
    /// The record's pending sequence is empty afterwards. Pair with
    /// [`finish_batch`](Self::finish_batch) once the callbacks have run.
    pub fn take_batch(&mut self, label: &str) -> SchedulerResult<Option<Batch>> {
        let record = self
            .tasks
            .get_mut(label)
            .ok_or_else(|| SchedulerError::UnknownLabel(label.to_string()))?;

        if !record.has_pending() {
            return Ok(None);
        }

        if record.interval_ms > self.config.default_interval_ms {
            self.hooks.working(label);
        }

        let now = self.clock.now_ms();
        record.start_ms = now;
        let callbacks: Vec<Callback> = record.callbacks.drain(..).collect();
        debug!(%label, count = callbacks.len(), now, "TaskScheduler::take_batch: executing deferred tasks");

        Ok(Some(Batch {
            label: label.to_string(),
            callbacks,
            started_ms: now,
        }))
    }

    /// Run a taken batch under the configured failure policy
    pub fn run_batch(&self, batch: Batch) -> (u64, BatchRun) {
        let started = batch.started_ms;
        (started, batch_run(batch.label, batch.callbacks, self.config.failure_policy))
    }

    /// Record the end of a batch and adapt the label's interval
    pub fn finish_batch(&mut self, label: &str, started_ms: u64, run: BatchRun) -> SchedulerResult<bool> {
        let now = self.clock.now_ms();
        self.stats.batches_executed += 1;
        self.stats.callbacks_run += run.ran as u64;

        let Some(record) = self.tasks.get_mut(label) else {
            debug!(%label, "TaskScheduler::finish_batch: record flushed while running");
            return run.failure.map_or(Ok(true), Err);
        };
        record.end_ms = Some(now);

        if let Some(failure) = &run.failure {
            self.stats.callback_failures += 1;
            warn!(%label, error = %failure, "Deferred task failed");
        }
        if run.failure.is_some() && self.config.failure_policy == FailurePolicy::Abort {
            return run.failure.map_or(Ok(true), Err);
        }

        let duration = now.saturating_sub(started_ms);
        if duration > record.interval_ms {
            debug!(%label, duration, interval = record.interval_ms, "TaskScheduler::finish_batch: growing interval");
            record.interval_ms = duration;
            self.stats.backoff_growths += 1;
            self.hooks.finished(label, duration);
        }

        run.failure.map_or(Ok(true), Err)
    }

    /// Handle a fired label timer
    ///
    /// A handle that no longer matches the record's armed timer is ignored.
    pub fn timer_fired(&mut self, label: &str, handle: TimerHandle) -> SchedulerResult<bool> {
        let record = self
            .tasks
            .get_mut(label)
            .ok_or_else(|| SchedulerError::UnknownLabel(label.to_string()))?;

        if record.timer != Some(handle) {
            debug!(%label, %handle, armed = ?record.timer, "TaskScheduler::timer_fired: superseded timer");
            return Ok(false);
        }
        record.timer = None;
        self.execute_tasks(label)
    }

    /// Run and remove the oldest pending callback for `label`
    pub fn next_task(&mut self, label: &str) -> SchedulerResult<bool> {
        debug!(%label, "TaskScheduler::next_task: called");
        self.step(label, false)
    }

    /// Run and remove the newest pending callback for `label`
    pub fn last_task(&mut self, label: &str) -> SchedulerResult<bool> {
        debug!(%label, "TaskScheduler::last_task: called");
        self.step(label, true)
    }

    fn step(&mut self, label: &str, newest: bool) -> SchedulerResult<bool> {
        let record = self
            .tasks
            .get_mut(label)
            .ok_or_else(|| SchedulerError::UnknownLabel(label.to_string()))?;

        let (index, callback) = if newest {
            (record.callbacks.len().saturating_sub(1), record.callbacks.pop_back())
        } else {
            (0, record.callbacks.pop_front())
        };
        let Some(callback) = callback else {
            debug!(%label, "TaskScheduler::step: nothing pending");
            return Ok(false);
        };

        self.stats.callbacks_stepped += 1;
        callback().map_err(|cause| {
            self.stats.callback_failures += 1;
            warn!(%label, index, error = %cause, "Stepped task failed");
            SchedulerError::CallbackFailure {
                label: label.to_string(),
                index,
                cause,
            }
        })?;
        Ok(true)
    }

    /// Remove a label entirely, cancelling its armed timer
    pub fn flush_task(&mut self, label: &str) -> Option<TaskRecord> {
        debug!(%label, "TaskScheduler::flush_task: called");
        let mut record = self.tasks.remove(label)?;
        if let Some(handle) = record.timer.take() {
            self.timer.cancel(handle);
        }
        Some(record)
    }

    /// Execute every pending batch, reset intervals, then remove every record
    pub fn flush_all(&mut self) -> FlushReport {
        debug!(tasks = self.tasks.len(), "TaskScheduler::flush_all: called");
        let mut report = self.execute_pending();

        // Removed records leave with the default interval, whatever the idle batch measured
        for (_, mut record) in std::mem::take(&mut self.tasks) {
            record.interval_ms = self.config.default_interval_ms;
            if let Some(handle) = record.timer.take() {
                self.timer.cancel(handle);
            }
            report.records.push(record);
        }

        if !report.records.is_empty() {
            info!(
                removed = report.records.len(),
                executed = report.executed.len(),
                "Flushed all tasks"
            );
        }
        report
    }

    /// Execute every pending batch from the default interval, keeping all records
    ///
    /// Growth measured while an idle batch runs is kept.
    pub fn drain_idle(&mut self) -> FlushReport {
        debug!(tasks = self.tasks.len(), "TaskScheduler::drain_idle: called");
        let report = self.execute_pending();

        for label in &report.executed {
            if let Some(handle) = self.tasks.get_mut(label).and_then(|r| r.timer.take()) {
                self.timer.cancel(handle);
            }
        }
        report
    }

    fn execute_pending(&mut self) -> FlushReport {
        let pending: Vec<String> = self
            .tasks
            .values()
            .filter(|r| r.has_pending())
            .map(|r| r.label.clone())
            .collect();

        let mut report = FlushReport::default();
        for label in pending {
            // Reset first: an idle batch never announces working() and keeps what it measures
            if let Some(record) = self.tasks.get_mut(&label) {
                record.interval_ms = self.config.default_interval_ms;
            }
            if let Err(e) = self.execute_tasks(&label) {
                report.failures.push(e);
            }
            self.stats.idle_resets += 1;
            report.executed.push(label);
        }
        report
    }

    pub fn task(&self, label: &str) -> Option<TaskSnapshot> {
        self.tasks.get(label).map(TaskRecord::snapshot)
    }

    /// Snapshots of every record, in label order
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        self.tasks.values().map(TaskRecord::snapshot).collect()
    }

    pub fn record(&self, label: &str) -> Option<&TaskRecord> {
        self.tasks.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.tasks.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Replace the configuration; existing records keep their intervals
    pub fn set_config(&mut self, config: SchedulerConfig) {
        debug!(?config, "TaskScheduler::set_config: called");
        self.config = config;
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}

fn batch_run(label: String, callbacks: Vec<Callback>, policy: FailurePolicy) -> BatchRun {
    let mut ran = 0;
    let mut failure = None;

    for (index, callback) in callbacks.into_iter().enumerate() {
        ran += 1;
        if let Err(cause) = callback() {
            if failure.is_none() {
                failure = Some(SchedulerError::CallbackFailure {
                    label: label.clone(),
                    index,
                    cause,
                });
            } else {
                warn!(%label, index, error = %cause, "Additional deferred task failure");
            }
            if policy == FailurePolicy::Abort {
                break;
            }
        }
    }

    BatchRun { ran, failure }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::clock::ManualClock;
    use crate::timer::{TimerDriver, TimerQueue};

    type Log = Arc<Mutex<Vec<String>>>;

    fn scheduler(default_interval_ms: u64) -> (TaskScheduler<ManualClock, TimerQueue>, ManualClock) {
        let clock = ManualClock::new(0);
        let scheduler = TaskScheduler::new(
            SchedulerConfig {
                default_interval_ms,
                ..Default::default()
            },
            clock.clone(),
            TimerQueue::fixed_only(),
        )
        .with_hooks(crate::scheduler::NoopHooks);
        (scheduler, clock)
    }

    fn push(log: &Log, name: &'static str) -> Callback {
        let log = log.clone();
        Box::new(move || {
            log.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[derive(Clone, Default)]
    struct RecordingHooks(Log);

    impl LongTaskHooks for RecordingHooks {
        fn working(&self, label: &str) {
            self.0.lock().unwrap().push(format!("working:{label}"));
        }

        fn finished(&self, label: &str, duration_ms: u64) {
            self.0.lock().unwrap().push(format!("finished:{label}:{duration_ms}"));
        }
    }

    #[test]
    fn test_execute_unknown_label() {
        let (mut scheduler, _) = scheduler(100);
        let err = scheduler.execute_tasks("missing").unwrap_err();
        assert!(err.is_unknown_label());
        assert!(scheduler.next_task("missing").unwrap_err().is_unknown_label());
        assert!(scheduler.last_task("missing").unwrap_err().is_unknown_label());
    }

    #[test]
    fn test_debounce_keeps_latest() {
        let (mut scheduler, _) = scheduler(100);
        let log = Log::default();

        scheduler.schedule_task("save", push(&log, "cb1"), ScheduleOptions::debounce());
        let snapshot = scheduler.schedule_task("save", push(&log, "cb2"), ScheduleOptions::debounce());
        assert_eq!(snapshot.pending, 1);

        assert!(scheduler.execute_tasks("save").unwrap());
        assert_eq!(entries(&log), vec!["cb2"]);
        assert_eq!(scheduler.stats().total_debounced, 1);
    }

    #[test]
    fn test_queue_mode_coalesces_in_order() {
        let (mut scheduler, _) = scheduler(100);
        let log = Log::default();

        scheduler.schedule_task("render", push(&log, "a"), ScheduleOptions::queued());
        scheduler.schedule_task("render", push(&log, "b"), ScheduleOptions::queued());
        let snapshot = scheduler.schedule_task("render", push(&log, "c"), ScheduleOptions::debounce());
        assert!(snapshot.queue_mode);
        assert_eq!(snapshot.pending, 3);

        assert!(scheduler.execute_tasks("render").unwrap());
        assert_eq!(entries(&log), vec!["a", "b", "c"]);
        assert!(!scheduler.execute_tasks("render").unwrap());
    }

    #[test]
    fn test_reschedule_keeps_single_armed_timer() {
        let (mut scheduler, clock) = scheduler(100);
        let log = Log::default();

        let first = scheduler.schedule_task("save", push(&log, "a"), ScheduleOptions::debounce());
        clock.advance(50);
        let second = scheduler.schedule_task("save", push(&log, "b"), ScheduleOptions::debounce());

        assert_ne!(first.timer, second.timer);
        assert_eq!(scheduler.timer().armed(), 1);
        assert_eq!(scheduler.timer().next_deadline(), Some(150));
    }

    #[test]
    fn test_timer_fire_executes_batch() {
        let (mut scheduler, clock) = scheduler(100);
        let log = Log::default();
        scheduler.schedule_task("save", push(&log, "a"), ScheduleOptions::debounce());

        clock.advance(100);
        let fired = scheduler.timer_mut().pop_due(clock.now_ms()).unwrap();
        let TimerEvent::Execute(label) = fired.event else {
            panic!("expected a label timer");
        };
        assert!(scheduler.timer_fired(&label, fired.handle).unwrap());
        assert_eq!(entries(&log), vec!["a"]);
        assert_eq!(scheduler.task("save").unwrap().timer, None);
    }

    #[test]
    fn test_superseded_timer_is_ignored() {
        let (mut scheduler, _) = scheduler(100);
        let log = Log::default();
        let first = scheduler.schedule_task("save", push(&log, "a"), ScheduleOptions::debounce());
        scheduler.schedule_task("save", push(&log, "b"), ScheduleOptions::debounce());

        assert!(!scheduler.timer_fired("save", first.timer.unwrap()).unwrap());
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_adaptive_growth_to_observed_duration() {
        let (mut scheduler, clock) = scheduler(100);
        let hooks = RecordingHooks::default();
        scheduler.set_hooks(Box::new(hooks.clone()));

        let slow = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                slow.advance(250);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        assert!(scheduler.execute_tasks("index").unwrap());

        let task = scheduler.task("index").unwrap();
        assert_eq!(task.interval_ms, 250);
        assert_eq!(task.duration_ms, Some(250));
        assert_eq!(entries(&hooks.0), vec!["finished:index:250"]);

        // The next batch for the grown label announces itself
        scheduler.schedule_task("index", || Ok(()), ScheduleOptions::debounce());
        scheduler.execute_tasks("index").unwrap();
        assert_eq!(entries(&hooks.0), vec!["finished:index:250", "working:index"]);
        assert_eq!(scheduler.task("index").unwrap().interval_ms, 250);
    }

    #[test]
    fn test_fast_batch_does_not_shrink_interval() {
        let (mut scheduler, clock) = scheduler(100);
        let slow = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                slow.advance(300);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        scheduler.execute_tasks("index").unwrap();

        let fast = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                fast.advance(120);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        scheduler.execute_tasks("index").unwrap();
        assert_eq!(scheduler.task("index").unwrap().interval_ms, 300);
    }

    #[test]
    fn test_rescheduled_label_uses_grown_interval() {
        let (mut scheduler, clock) = scheduler(100);
        let slow = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                slow.advance(250);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        scheduler.execute_tasks("index").unwrap();

        let now = clock.now_ms();
        scheduler.schedule_task("index", || Ok(()), ScheduleOptions::debounce());
        assert_eq!(scheduler.timer().next_deadline(), Some(now + 250));
    }

    #[test]
    fn test_abort_policy_drops_rest_of_batch() {
        let (mut scheduler, clock) = scheduler(100);
        let log = Log::default();
        scheduler.schedule_task("sync", push(&log, "a"), ScheduleOptions::queued());
        let slow = clock.clone();
        scheduler.schedule_task(
            "sync",
            move || {
                slow.advance(500);
                Err(eyre::eyre!("boom"))
            },
            ScheduleOptions::queued(),
        );
        scheduler.schedule_task("sync", push(&log, "c"), ScheduleOptions::queued());

        let err = scheduler.execute_tasks("sync").unwrap_err();
        assert!(matches!(err, SchedulerError::CallbackFailure { index: 1, .. }));
        assert_eq!(entries(&log), vec!["a"]);

        let task = scheduler.task("sync").unwrap();
        assert_eq!(task.pending, 0);
        assert_eq!(task.interval_ms, 100);
        assert_eq!(scheduler.stats().callback_failures, 1);
    }

    #[test]
    fn test_isolate_policy_runs_everything() {
        let (mut scheduler, clock) = scheduler(100);
        scheduler.set_config(SchedulerConfig {
            default_interval_ms: 100,
            failure_policy: FailurePolicy::Isolate,
            ..Default::default()
        });
        let log = Log::default();
        scheduler.schedule_task("sync", push(&log, "a"), ScheduleOptions::queued());
        let slow = clock.clone();
        scheduler.schedule_task(
            "sync",
            move || {
                slow.advance(500);
                Err(eyre::eyre!("boom"))
            },
            ScheduleOptions::queued(),
        );
        scheduler.schedule_task("sync", push(&log, "c"), ScheduleOptions::queued());

        let err = scheduler.execute_tasks("sync").unwrap_err();
        assert!(matches!(err, SchedulerError::CallbackFailure { index: 1, .. }));
        assert_eq!(entries(&log), vec!["a", "c"]);
        assert_eq!(scheduler.task("sync").unwrap().interval_ms, 500);
    }

    #[test]
    fn test_take_batch_clears_pending_before_callbacks_run() {
        let (mut scheduler, _) = scheduler(100);
        let log = Log::default();
        scheduler.schedule_task("render", push(&log, "first"), ScheduleOptions::queued());

        let batch = scheduler.take_batch("render").unwrap().unwrap();
        assert_eq!(batch.len(), 1);

        // Arrives while the batch is out; must not join it
        scheduler.schedule_task("render", push(&log, "second"), ScheduleOptions::queued());
        let (started, run) = scheduler.run_batch(batch);
        assert!(scheduler.finish_batch("render", started, run).unwrap());

        assert_eq!(entries(&log), vec!["first"]);
        assert_eq!(scheduler.task("render").unwrap().pending, 1);
        assert!(scheduler.execute_tasks("render").unwrap());
        assert_eq!(entries(&log), vec!["first", "second"]);
    }

    #[test]
    fn test_next_and_last_step_through_queue() {
        let (mut scheduler, _) = scheduler(100);
        let log = Log::default();
        for name in ["a", "b", "c"] {
            scheduler.schedule_task("steps", push(&log, name), ScheduleOptions::queued());
        }

        assert!(scheduler.next_task("steps").unwrap());
        assert!(scheduler.last_task("steps").unwrap());
        assert_eq!(entries(&log), vec!["a", "c"]);
        assert_eq!(scheduler.task("steps").unwrap().pending, 1);

        assert!(scheduler.next_task("steps").unwrap());
        assert!(!scheduler.next_task("steps").unwrap());
        assert!(!scheduler.last_task("steps").unwrap());
        assert_eq!(entries(&log), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_step_failure_reports_position() {
        let (mut scheduler, _) = scheduler(100);
        scheduler.schedule_task("steps", || Ok(()), ScheduleOptions::queued());
        scheduler.schedule_task("steps", || Err(eyre::eyre!("nope")), ScheduleOptions::queued());

        let err = scheduler.last_task("steps").unwrap_err();
        assert!(matches!(err, SchedulerError::CallbackFailure { index: 1, .. }));
        assert_eq!(scheduler.task("steps").unwrap().pending, 1);
    }

    #[test]
    fn test_flush_task_cancels_timer() {
        let (mut scheduler, _) = scheduler(100);
        scheduler.schedule_task("save", || Ok(()), ScheduleOptions::debounce());

        let record = scheduler.flush_task("save").unwrap();
        assert_eq!(record.label(), "save");
        assert_eq!(record.pending(), 1);
        assert_eq!(record.timer(), None);
        assert_eq!(scheduler.timer().armed(), 0);
        assert!(scheduler.flush_task("save").is_none());
        assert!(scheduler.execute_tasks("save").unwrap_err().is_unknown_label());
    }

    #[test]
    fn test_flush_all_executes_resets_and_removes() {
        let (mut scheduler, clock) = scheduler(100);
        let log = Log::default();

        let slow = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                slow.advance(400);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        scheduler.execute_tasks("index").unwrap();
        assert_eq!(scheduler.task("index").unwrap().interval_ms, 400);

        scheduler.schedule_task("save", push(&log, "save"), ScheduleOptions::debounce());
        scheduler.schedule_task("index", push(&log, "index"), ScheduleOptions::debounce());

        let report = scheduler.flush_all();
        assert_eq!(report.labels(), vec!["index", "save"]);
        assert_eq!(report.executed, vec!["index", "save"]);
        assert!(report.failures.is_empty());
        assert!(report.records.iter().all(|r| r.interval_ms() == 100));
        assert_eq!(entries(&log), vec!["index", "save"]);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.timer().armed(), 0);

        assert!(scheduler.flush_all().records.is_empty());
    }

    #[test]
    fn test_flush_all_collects_failures() {
        let (mut scheduler, _) = scheduler(100);
        let log = Log::default();
        scheduler.schedule_task("bad", || Err(eyre::eyre!("broken")), ScheduleOptions::debounce());
        scheduler.schedule_task("good", push(&log, "good"), ScheduleOptions::debounce());

        let report = scheduler.flush_all();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].label(), Some("bad"));
        assert_eq!(entries(&log), vec!["good"]);
    }

    #[test]
    fn test_drain_idle_keeps_records() {
        let (mut scheduler, clock) = scheduler(100);
        let log = Log::default();
        let slow = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                slow.advance(300);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        scheduler.execute_tasks("index").unwrap();

        scheduler.schedule_task("index", push(&log, "index"), ScheduleOptions::debounce());
        let report = scheduler.drain_idle();

        assert!(report.records.is_empty());
        assert_eq!(report.executed, vec!["index"]);
        let task = scheduler.task("index").unwrap();
        assert_eq!(task.interval_ms, 100);
        assert_eq!(task.pending, 0);
        assert_eq!(task.timer, None);
        assert_eq!(entries(&log), vec!["index"]);

        assert!(scheduler.drain_idle().is_empty());
    }

    #[test]
    fn test_drain_idle_keeps_growth_from_idle_batch() {
        let (mut scheduler, clock) = scheduler(100);
        let hooks = RecordingHooks::default();
        scheduler.set_hooks(Box::new(hooks.clone()));

        let slow = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                slow.advance(300);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        scheduler.execute_tasks("index").unwrap();
        assert_eq!(scheduler.task("index").unwrap().interval_ms, 300);
        hooks.0.lock().unwrap().clear();

        let slow = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                slow.advance(350);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        scheduler.drain_idle();

        assert_eq!(entries(&hooks.0), vec!["finished:index:350"]);
        assert_eq!(scheduler.task("index").unwrap().interval_ms, 350);
    }

    #[test]
    fn test_flush_all_does_not_announce_working() {
        let (mut scheduler, clock) = scheduler(100);
        let hooks = RecordingHooks::default();
        scheduler.set_hooks(Box::new(hooks.clone()));

        let slow = clock.clone();
        scheduler.schedule_task(
            "index",
            move || {
                slow.advance(300);
                Ok(())
            },
            ScheduleOptions::debounce(),
        );
        scheduler.execute_tasks("index").unwrap();
        hooks.0.lock().unwrap().clear();

        scheduler.schedule_task("index", || Ok(()), ScheduleOptions::debounce());
        let report = scheduler.flush_all();

        assert!(entries(&hooks.0).is_empty());
        assert_eq!(report.executed, vec!["index"]);
        assert_eq!(report.records[0].interval_ms(), 100);
    }

    #[test]
    fn test_frame_pacing_requested_without_support_falls_back() {
        let (mut scheduler, _) = scheduler(100);
        let snapshot = scheduler.schedule_task("paint", || Ok(()), ScheduleOptions::default());
        assert_eq!(snapshot.pacing, Pacing::Fixed);
    }

    #[test]
    fn test_default_queue_applies_to_unspecified_mode() {
        let clock = ManualClock::new(0);
        let config = SchedulerConfig {
            default_queue: true,
            ..Default::default()
        };
        let mut scheduler =
            TaskScheduler::new(config, clock, TimerQueue::fixed_only()).with_hooks(crate::scheduler::NoopHooks);
        let log = Log::default();

        scheduler.schedule_task("log", push(&log, "a"), ScheduleOptions::default());
        let snapshot = scheduler.schedule_task("log", push(&log, "b"), ScheduleOptions::default());
        assert!(snapshot.queue_mode);
        assert_eq!(snapshot.pending, 2);

        // An explicit choice still wins
        let snapshot = scheduler.schedule_task("save", || Ok(()), ScheduleOptions::debounce());
        assert!(!snapshot.queue_mode);

        scheduler.execute_tasks("log").unwrap();
        assert_eq!(entries(&log), vec!["a", "b"]);
    }

    #[test]
    fn test_frame_pacing_when_supported() {
        let clock = ManualClock::new(0);
        let mut scheduler = TaskScheduler::new(
            SchedulerConfig::default(),
            clock.clone(),
            TimerQueue::with_frame_period(Some(16)),
        )
        .with_hooks(crate::scheduler::NoopHooks);

        let snapshot = scheduler.schedule_task("paint", || Ok(()), ScheduleOptions::default());
        assert_eq!(snapshot.pacing, Pacing::Frame);
        assert_eq!(scheduler.timer().next_deadline(), Some(112));
    }

    #[test]
    fn test_set_config_applies_to_new_labels_only() {
        let (mut scheduler, _) = scheduler(100);
        scheduler.schedule_task("old", || Ok(()), ScheduleOptions::debounce());
        scheduler.set_config(SchedulerConfig {
            default_interval_ms: 500,
            ..Default::default()
        });
        scheduler.schedule_task("new", || Ok(()), ScheduleOptions::debounce());

        assert_eq!(scheduler.task("old").unwrap().interval_ms, 100);
        assert_eq!(scheduler.task("new").unwrap().interval_ms, 500);
    }

    #[test]
    fn test_stats_tracking() {
        let (mut scheduler, _) = scheduler(100);
        scheduler.schedule_task("a", || Ok(()), ScheduleOptions::queued());
        scheduler.schedule_task("a", || Ok(()), ScheduleOptions::queued());
        scheduler.schedule_task("b", || Ok(()), ScheduleOptions::debounce());
        scheduler.execute_tasks("a").unwrap();

        let stats = scheduler.stats();
        assert_eq!(stats.tasks_created, 2);
        assert_eq!(stats.total_scheduled, 3);
        assert_eq!(stats.total_coalesced, 1);
        assert_eq!(stats.batches_executed, 1);
        assert_eq!(stats.callbacks_run, 2);
        assert_eq!(stats.peak_pending, 2);
    }
}
