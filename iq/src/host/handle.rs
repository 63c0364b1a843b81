//! SchedulerHandle - cloneable front door to the engine actor

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::engine::{Engine, EngineStats};
use crate::scheduler::{
    CallbackError, FlushReport, LongTaskHooks, ScheduleOptions, SchedulerError, SchedulerResult, TaskRecord,
    TaskSnapshot,
};

use super::actor::actor_loop;
use super::messages::EngineCommand;

/// Handle to send commands to the engine actor
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl SchedulerHandle {
    /// Spawn a new engine actor with logging hooks
    pub fn spawn(config: &Config) -> Self {
        Self::spawn_inner(config, None)
    }

    /// Spawn a new engine actor with custom long-task hooks
    pub fn spawn_with_hooks(config: &Config, hooks: impl LongTaskHooks + 'static) -> Self {
        Self::spawn_inner(config, Some(Box::new(hooks)))
    }

    fn spawn_inner(config: &Config, hooks: Option<Box<dyn LongTaskHooks>>) -> Self {
        debug!(profile = %config.profile, "SchedulerHandle::spawn: called");
        let clock = SystemClock::new();
        let mut engine = Engine::from_config(config, clock);
        if let Some(hooks) = hooks {
            engine.scheduler_mut().set_hooks(hooks);
        }

        // Unbounded so callbacks can enqueue work without awaiting
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(actor_loop(engine, clock, rx));

        info!("Engine actor spawned");
        Self { tx }
    }

    fn send(&self, command: EngineCommand) -> SchedulerResult<()> {
        self.tx.send(command).map_err(|_| SchedulerError::ChannelClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand) -> SchedulerResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Defer `callback` under `label` and wait for the updated record
    pub async fn schedule_task<F>(&self, label: &str, callback: F, options: ScheduleOptions) -> SchedulerResult<TaskSnapshot>
    where
        F: FnOnce() -> Result<(), CallbackError> + Send + 'static,
    {
        let label = label.to_string();
        self.request(|reply| EngineCommand::Schedule {
            label,
            callback: Box::new(callback),
            options,
            reply: Some(reply),
        })
        .await
    }

    /// Defer `callback` without waiting; usable from inside a running callback
    ///
    /// A pending callback that captures a handle keeps the actor alive until it
    /// runs or is flushed, even after every other handle is dropped. Call
    /// [`shutdown`](Self::shutdown) to stop the actor regardless.
    pub fn schedule_detached<F>(&self, label: &str, callback: F, options: ScheduleOptions) -> SchedulerResult<()>
    where
        F: FnOnce() -> Result<(), CallbackError> + Send + 'static,
    {
        self.send(EngineCommand::Schedule {
            label: label.to_string(),
            callback: Box::new(callback),
            options,
            reply: None,
        })
    }

    pub async fn execute_tasks(&self, label: &str) -> SchedulerResult<bool> {
        let label = label.to_string();
        self.request(|reply| EngineCommand::Execute { label, reply }).await?
    }

    pub async fn next_task(&self, label: &str) -> SchedulerResult<bool> {
        let label = label.to_string();
        self.request(|reply| EngineCommand::Next { label, reply }).await?
    }

    pub async fn last_task(&self, label: &str) -> SchedulerResult<bool> {
        let label = label.to_string();
        self.request(|reply| EngineCommand::Last { label, reply }).await?
    }

    pub async fn flush_task(&self, label: &str) -> SchedulerResult<Option<TaskRecord>> {
        let label = label.to_string();
        self.request(|reply| EngineCommand::Flush { label, reply }).await
    }

    pub async fn flush_all(&self) -> SchedulerResult<FlushReport> {
        self.request(|reply| EngineCommand::FlushAll { reply }).await
    }

    pub async fn drain_idle(&self) -> SchedulerResult<FlushReport> {
        self.request(|reply| EngineCommand::Drain { reply }).await
    }

    pub async fn task(&self, label: &str) -> SchedulerResult<Option<TaskSnapshot>> {
        let label = label.to_string();
        self.request(|reply| EngineCommand::Task { label, reply }).await
    }

    pub async fn tasks(&self) -> SchedulerResult<Vec<TaskSnapshot>> {
        self.request(|reply| EngineCommand::Tasks { reply }).await
    }

    pub async fn stats(&self) -> SchedulerResult<EngineStats> {
        self.request(|reply| EngineCommand::Stats { reply }).await
    }

    pub async fn is_idle(&self) -> SchedulerResult<bool> {
        self.request(|reply| EngineCommand::IsIdle { reply }).await
    }

    /// Report host activity
    pub fn activity(&self) -> SchedulerResult<()> {
        self.send(EngineCommand::Activity)
    }

    /// Capability for the host's input layer to report activity
    pub fn activity_handle(&self) -> ActivityHandle {
        ActivityHandle { tx: self.tx.clone() }
    }

    /// Stop the actor; pending work is dropped
    pub async fn shutdown(&self) -> SchedulerResult<()> {
        self.request(|reply| EngineCommand::Shutdown { reply }).await
    }
}

/// Resets the idle monitor's on-time counter; hand this to whatever observes input
#[derive(Clone)]
pub struct ActivityHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl ActivityHandle {
    pub fn signal(&self) -> SchedulerResult<()> {
        self.tx
            .send(EngineCommand::Activity)
            .map_err(|_| SchedulerError::ChannelClosed)
    }
}
