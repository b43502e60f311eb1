//! Errors raised while building or mutating tasks.

use crate::id::TaskId;
use crate::task::TaskStatus;

/// Errors from the task model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A task declared a zero duration
    #[error("task {0} must have a positive estimated duration")]
    InvalidDuration(TaskId),

    /// A status change that would move backwards or skip `Running`
    #[error("task {task}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        /// Task being changed
        task: TaskId,
        /// Current status
        from: TaskStatus,
        /// Rejected target
        to: TaskStatus,
    },

    /// I/O error reading a declaration file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed declaration file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
