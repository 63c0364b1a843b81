//! idlequeue - idle-aware, label-keyed deferred task scheduling
//!
//! idlequeue defers work until a quiet moment. Callers queue callbacks under a
//! label; a label's pending batch runs when its debounce window expires, or
//! earlier when the host is found to be idle.
//!
//! # Core Concepts
//!
//! - **Debounce or Queue**: A label either keeps only its newest callback or
//!   coalesces every callback into one batch
//! - **Adaptive Backoff**: A batch that overruns its window widens the window
//! - **Idle by Drift**: Idleness is inferred from how punctually a repeating
//!   poll fires, not from OS input APIs
//! - **Callbacks as Data**: Timers carry a [`timer::TimerEvent`] that the
//!   [`engine::Engine`] dispatches, so nothing runs re-entrantly
//!
//! # Modules
//!
//! - [`clock`] - Monotonic time sources
//! - [`timer`] - Deferred-execution timer primitive and heap-backed queue
//! - [`monitor`] - Idle monitor state machine
//! - [`scheduler`] - Label table, batches and interval adaptation
//! - [`engine`] - Monitor and scheduler on one timer
//! - [`host`] - Tokio actor owning an engine
//! - [`simulate`] - Deterministic scripted runs on a manual clock
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod host;
pub mod monitor;
pub mod scheduler;
pub mod simulate;
pub mod timer;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Profile};
pub use engine::{DueReport, Engine, EngineConfig, EngineStats, IdleAction};
pub use host::{ActivityHandle, EngineCommand, SchedulerHandle};
pub use monitor::{IdleMonitor, MonitorConfig, MonitorStats, PollOutcome};
pub use scheduler::{
    Callback, CallbackError, FailurePolicy, FlushReport, LoggingHooks, LongTaskHooks, NoopHooks, ScheduleOptions,
    SchedulerConfig, SchedulerError, SchedulerResult, SchedulerStats, TaskRecord, TaskScheduler, TaskSnapshot,
};
pub use simulate::{Simulation, SimulationReport, TimelineEntry, TimelineKind};
pub use timer::{Pacing, Timer, TimerDriver, TimerEvent, TimerHandle, TimerQueue};
