//! autocrew core data models.
//!
//! This crate defines the task declarations that the orchestration
//! engine resolves, dispatches and records.

#![warn(missing_docs)]

// Core identities
mod id;

// Task model
mod task;
mod declaration;
mod error;

// Re-exports
pub use id::TaskId;
pub use task::{Task, Category, Priority, TaskStatus};
pub use declaration::{TaskDeclaration, builtin_queue, load_declarations, parse_declarations};
pub use error::CoreError;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
