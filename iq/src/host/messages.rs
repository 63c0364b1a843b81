//! Host actor messages
//!
//! Commands and responses for the actor pattern.

use tokio::sync::oneshot;

use crate::engine::EngineStats;
use crate::scheduler::{Callback, FlushReport, ScheduleOptions, SchedulerResult, TaskRecord, TaskSnapshot};

/// Commands sent to the engine actor
pub enum EngineCommand {
    Schedule {
        label: String,
        callback: Callback,
        options: ScheduleOptions,
        reply: Option<oneshot::Sender<TaskSnapshot>>,
    },
    Execute {
        label: String,
        reply: oneshot::Sender<SchedulerResult<bool>>,
    },
    Next {
        label: String,
        reply: oneshot::Sender<SchedulerResult<bool>>,
    },
    Last {
        label: String,
        reply: oneshot::Sender<SchedulerResult<bool>>,
    },
    Flush {
        label: String,
        reply: oneshot::Sender<Option<TaskRecord>>,
    },
    FlushAll {
        reply: oneshot::Sender<FlushReport>,
    },
    Drain {
        reply: oneshot::Sender<FlushReport>,
    },
    Task {
        label: String,
        reply: oneshot::Sender<Option<TaskSnapshot>>,
    },
    Tasks {
        reply: oneshot::Sender<Vec<TaskSnapshot>>,
    },
    Stats {
        reply: oneshot::Sender<EngineStats>,
    },
    IsIdle {
        reply: oneshot::Sender<bool>,
    },
    Activity,
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

impl EngineCommand {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            EngineCommand::Schedule { .. } => "schedule",
            EngineCommand::Execute { .. } => "execute",
            EngineCommand::Next { .. } => "next",
            EngineCommand::Last { .. } => "last",
            EngineCommand::Flush { .. } => "flush",
            EngineCommand::FlushAll { .. } => "flush_all",
            EngineCommand::Drain { .. } => "drain",
            EngineCommand::Task { .. } => "task",
            EngineCommand::Tasks { .. } => "tasks",
            EngineCommand::Stats { .. } => "stats",
            EngineCommand::IsIdle { .. } => "is_idle",
            EngineCommand::Activity => "activity",
            EngineCommand::Shutdown { .. } => "shutdown",
        }
    }
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EngineCommand::{}", self.kind())
    }
}
