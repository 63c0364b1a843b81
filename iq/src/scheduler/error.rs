//! Scheduler error types

use thiserror::Error;

/// What a task callback returns on failure
pub type CallbackError = eyre::Report;

/// Errors from scheduler operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Callback {index} for '{label}' failed: {cause:#}")]
    CallbackFailure {
        label: String,
        index: usize,
        cause: CallbackError,
    },

    #[error("Scheduler channel closed")]
    ChannelClosed,
}

impl SchedulerError {
    /// Label the error refers to, if any
    pub fn label(&self) -> Option<&str> {
        match self {
            SchedulerError::UnknownLabel(label) => Some(label),
            SchedulerError::CallbackFailure { label, .. } => Some(label),
            SchedulerError::ChannelClosed => None,
        }
    }

    pub fn is_unknown_label(&self) -> bool {
        matches!(self, SchedulerError::UnknownLabel(_))
    }

    pub fn is_callback_failure(&self) -> bool {
        matches!(self, SchedulerError::CallbackFailure { .. })
    }
}

/// Result of scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
