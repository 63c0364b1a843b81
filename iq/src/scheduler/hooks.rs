//! Long-task notification hooks

use tracing::info;

/// Notified around batches that are expected to, or did, run long
///
/// Override these for UI feedback such as a busy indicator.
pub trait LongTaskHooks: Send {
    /// A batch is about to run for a label whose interval has grown
    fn working(&self, label: &str) {
        info!(%label, "Handling a potentially long-running task...");
    }

    /// A batch overran its interval and the interval grew to `duration_ms`
    fn finished(&self, label: &str, duration_ms: u64) {
        info!(%label, duration_ms, "...Potentially long-running task complete.");
    }
}

/// Default hooks: log and carry on
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl LongTaskHooks for LoggingHooks {}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl LongTaskHooks for NoopHooks {
    fn working(&self, _label: &str) {}

    fn finished(&self, _label: &str, _duration_ms: u64) {}
}
