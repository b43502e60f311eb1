//! Ledger trait abstraction.

use async_trait::async_trait;
use autocrew_core::{TaskId, TaskStatus};
use std::path::PathBuf;

/// Error type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while writing the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The ledger artifact does not exist
    #[error("ledger artifact not found: {}", .0.display())]
    Missing(PathBuf),

    /// No marker line for the task
    #[error("no ledger marker for task {0}")]
    NotFound(TaskId),

    /// More than one marker line for the task
    #[error("task {0} has more than one ledger marker")]
    Duplicate(TaskId),

    /// The marker is already checked under a note this ledger did not write
    #[error("ledger marker for task {0} is checked by another actor")]
    Foreign(TaskId),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Marker pattern could not be built
    #[error("marker pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Persisted record of which tasks reached a terminal status.
///
/// Implementations must serialize concurrent `mark` calls: the orchestrator may
/// settle several tasks at once in its parallel mode.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Record `status` for `id`.
    ///
    /// Marking the same id with the same status twice must leave the visible
    /// marker as it was after the first call.
    async fn mark(&self, id: &TaskId, status: TaskStatus) -> Result<()>;
}
