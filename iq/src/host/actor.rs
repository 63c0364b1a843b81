//! Engine actor loop

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::clock::SystemClock;
use crate::engine::Engine;
use crate::timer::TimerQueue;

use super::messages::EngineCommand;

pub(super) type HostEngine = Engine<SystemClock, TimerQueue>;

/// Actor loop: alternate between due timers and incoming commands
pub(super) async fn actor_loop(mut engine: HostEngine, clock: SystemClock, mut rx: mpsc::UnboundedReceiver<EngineCommand>) {
    info!("Engine actor started");

    loop {
        let deadline = engine.next_deadline().map(|ms| clock.instant_at(ms));

        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    debug!("actor_loop: all handles dropped");
                    break;
                };
                if let Some(reply) = handle_command(&mut engine, command) {
                    let _ = reply.send(());
                    break;
                }
            }
            _ = sleep_until(deadline) => {
                let report = engine.run_due();
                if !report.is_empty() {
                    debug!(
                        polls = report.polls.len(),
                        executed = report.executed.len(),
                        idle_flushes = report.idle.len(),
                        failures = report.all_failures().count(),
                        "actor_loop: timers dispatched"
                    );
                }
            }
        }
    }

    info!("Engine actor stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Apply one command; returns the shutdown reply when the actor should stop
fn handle_command(engine: &mut HostEngine, command: EngineCommand) -> Option<oneshot::Sender<()>> {
    debug!(kind = command.kind(), "handle_command: called");

    // Replies are dropped silently if the requester went away
    match command {
        EngineCommand::Schedule {
            label,
            callback,
            options,
            reply,
        } => {
            let snapshot = engine.scheduler_mut().schedule_boxed(&label, callback, options);
            if let Some(reply) = reply {
                let _ = reply.send(snapshot);
            }
        }
        EngineCommand::Execute { label, reply } => {
            let _ = reply.send(engine.scheduler_mut().execute_tasks(&label));
        }
        EngineCommand::Next { label, reply } => {
            let _ = reply.send(engine.scheduler_mut().next_task(&label));
        }
        EngineCommand::Last { label, reply } => {
            let _ = reply.send(engine.scheduler_mut().last_task(&label));
        }
        EngineCommand::Flush { label, reply } => {
            let _ = reply.send(engine.scheduler_mut().flush_task(&label));
        }
        EngineCommand::FlushAll { reply } => {
            let _ = reply.send(engine.scheduler_mut().flush_all());
        }
        EngineCommand::Drain { reply } => {
            let _ = reply.send(engine.scheduler_mut().drain_idle());
        }
        EngineCommand::Task { label, reply } => {
            let _ = reply.send(engine.scheduler().task(&label));
        }
        EngineCommand::Tasks { reply } => {
            let _ = reply.send(engine.scheduler().tasks());
        }
        EngineCommand::Stats { reply } => {
            let _ = reply.send(engine.stats());
        }
        EngineCommand::IsIdle { reply } => {
            let _ = reply.send(engine.is_idle());
        }
        EngineCommand::Activity => engine.reset_activity(),
        EngineCommand::Shutdown { reply } => return Some(reply),
    }

    None
}
