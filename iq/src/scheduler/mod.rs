//! Label-keyed deferred task scheduler
//!
//! Each label owns one pending batch and one armed timer. Repeated requests
//! either replace the batch (debounce) or append to it (queue mode), and a
//! label whose batches keep overrunning gets a wider debounce window.

mod config;
mod core;
mod error;
mod hooks;
mod record;

pub use config::{FailurePolicy, SchedulerConfig};
pub use core::{BatchRun, TaskScheduler};
pub use error::{CallbackError, SchedulerError, SchedulerResult};
pub use hooks::{LoggingHooks, LongTaskHooks, NoopHooks};
pub use record::{Batch, Callback, FlushReport, ScheduleOptions, SchedulerStats, TaskRecord, TaskSnapshot};
