//! Task records and the values that leave the scheduler

use std::collections::VecDeque;

use serde::Serialize;

use crate::timer::{Pacing, TimerHandle};

use super::error::{CallbackError, SchedulerError};

/// A deferred, zero-argument action
pub type Callback = Box<dyn FnOnce() -> Result<(), CallbackError> + Send + 'static>;

/// Options for [`schedule_task`](super::TaskScheduler::schedule_task)
///
/// Only the first request for a label decides its mode and pacing; later
/// requests reuse whatever the record was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Append to the pending batch instead of replacing it; `None` uses the configured default
    pub queue: Option<bool>,
    /// Preferred timer pacing; frame pacing is used only where the timer supports it
    pub pacing: Pacing,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            queue: None,
            pacing: Pacing::Frame,
        }
    }
}

impl ScheduleOptions {
    /// Latest-wins debounce
    pub fn debounce() -> Self {
        Self {
            queue: Some(false),
            ..Self::default()
        }
    }

    /// Coalesce every request into one batch
    pub fn queued() -> Self {
        Self {
            queue: Some(true),
            ..Self::default()
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }
}

/// Everything the scheduler knows about one label
pub struct TaskRecord {
    pub(crate) label: String,
    pub(crate) callbacks: VecDeque<Callback>,
    pub(crate) interval_ms: u64,
    pub(crate) queue_mode: bool,
    pub(crate) pacing: Pacing,
    pub(crate) start_ms: u64,
    pub(crate) end_ms: Option<u64>,
    pub(crate) timer: Option<TimerHandle>,
}

impl TaskRecord {
    pub(crate) fn new(label: &str, interval_ms: u64, queue_mode: bool, pacing: Pacing, now_ms: u64) -> Self {
        Self {
            label: label.to_string(),
            callbacks: VecDeque::new(),
            interval_ms,
            queue_mode,
            pacing,
            start_ms: now_ms,
            end_ms: None,
            timer: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pending(&self) -> usize {
        self.callbacks.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.callbacks.is_empty()
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn queue_mode(&self) -> bool {
        self.queue_mode
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> Option<u64> {
        self.end_ms
    }

    /// Duration of the most recent execution
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_ms.map(|end| end.saturating_sub(self.start_ms))
    }

    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            label: self.label.clone(),
            pending: self.pending(),
            interval_ms: self.interval_ms,
            queue_mode: self.queue_mode,
            pacing: self.pacing,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            duration_ms: self.duration_ms(),
            timer: self.timer,
        }
    }
}

impl std::fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRecord")
            .field("label", &self.label)
            .field("pending", &self.callbacks.len())
            .field("interval_ms", &self.interval_ms)
            .field("queue_mode", &self.queue_mode)
            .field("pacing", &self.pacing)
            .field("start_ms", &self.start_ms)
            .field("end_ms", &self.end_ms)
            .field("timer", &self.timer)
            .finish()
    }
}

/// Callback-free view of a [`TaskRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub label: String,
    pub pending: usize,
    pub interval_ms: u64,
    pub queue_mode: bool,
    pub pacing: Pacing,
    pub start_ms: u64,
    pub end_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub timer: Option<TimerHandle>,
}

/// Callbacks taken out of a record for execution
///
/// The record's pending sequence is already empty by the time a batch exists,
/// so anything scheduled while the batch runs starts a fresh one.
pub struct Batch {
    pub(crate) label: String,
    pub(crate) callbacks: Vec<Callback>,
    pub(crate) started_ms: u64,
}

impl Batch {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn started_ms(&self) -> u64 {
        self.started_ms
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("label", &self.label)
            .field("callbacks", &self.callbacks.len())
            .field("started_ms", &self.started_ms)
            .finish()
    }
}

/// Records removed (or drained) by an idle flush
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Records in label order
    pub records: Vec<TaskRecord>,
    /// Labels whose pending batch was executed
    pub executed: Vec<String>,
    /// Callback failures raised while executing
    pub failures: Vec<SchedulerError>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.executed.is_empty() && self.failures.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.label()).collect()
    }
}

/// Counters for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub tasks_created: u64,
    pub total_scheduled: u64,
    /// Requests that replaced a pending batch
    pub total_debounced: u64,
    /// Requests appended to a pending batch
    pub total_coalesced: u64,
    pub batches_executed: u64,
    pub callbacks_run: u64,
    pub callbacks_stepped: u64,
    pub callback_failures: u64,
    pub backoff_growths: u64,
    pub idle_resets: u64,
    pub peak_pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ScheduleOptions::default();
        assert_eq!(options.queue, None);
        assert_eq!(options.pacing, Pacing::Frame);
        assert_eq!(ScheduleOptions::debounce().queue, Some(false));
        assert_eq!(ScheduleOptions::queued().queue, Some(true));
        assert_eq!(
            ScheduleOptions::queued().with_pacing(Pacing::Fixed).pacing,
            Pacing::Fixed
        );
    }

    #[test]
    fn test_record_snapshot() {
        let mut record = TaskRecord::new("save", 100, true, Pacing::Fixed, 10);
        record.callbacks.push_back(Box::new(|| Ok(())));
        record.end_ms = Some(60);

        let snapshot = record.snapshot();
        assert_eq!(snapshot.label, "save");
        assert_eq!(snapshot.pending, 1);
        assert_eq!(snapshot.duration_ms, Some(50));
        assert!(snapshot.queue_mode);
        assert!(format!("{:?}", record).contains("pending: 1"));
    }
}
