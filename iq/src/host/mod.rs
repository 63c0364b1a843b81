//! Host actor - runs an [`Engine`](crate::engine::Engine) on a tokio task
//!
//! The actor task is the single execution context: it owns the engine, sleeps
//! until the next timer deadline and processes commands from
//! [`SchedulerHandle`]s in between. Work a callback schedules through a handle
//! is processed after the running batch, so it always starts a fresh batch.

mod actor;
mod handle;
mod messages;

pub use handle::{ActivityHandle, SchedulerHandle};
pub use messages::EngineCommand;
