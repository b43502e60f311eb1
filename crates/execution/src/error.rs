//! Execution errors.

use autocrew_core::{Category, TaskId};
use std::time::Duration;

/// Structural problems in a task set, found before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The dependency graph has a cycle
    #[error("circular dependency: {}", format_cycle(.cycle))]
    CyclicDependency {
        /// Tasks on the cycle; each depends on the next, the last on the first
        cycle: Vec<TaskId>,
    },

    /// A dependency names a task that was never declared
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        /// Declaring task
        task: TaskId,
        /// Missing id
        dependency: TaskId,
    },

    /// Two tasks share an id
    #[error("duplicate task id: {0}")]
    DuplicateTask(TaskId),
}

fn format_cycle(cycle: &[TaskId]) -> String {
    let mut path: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
    if let Some(first) = cycle.first() {
        path.push(first.as_str());
    }
    path.join(" -> ")
}

/// Errors that stop a run before dispatch.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A category in the run has no executor
    #[error("no executor registered for category {category} (needed by task {task})")]
    MissingExecutor {
        /// Category without an executor
        category: Category,
        /// First task that needs it
        task: TaskId,
    },

    /// A task handed to the orchestrator was not pending
    #[error("task {0} is not pending")]
    NotPending(TaskId),

    /// The same id appears twice in one run
    #[error("task {0} appears more than once in the run")]
    DuplicateTask(TaskId),

    /// Budget values out of range
    #[error("invalid budget: {0}")]
    InvalidBudget(String),
}

/// Why a task ended `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskFailure {
    /// The executor reported a failure or panicked
    #[error("executor failure: {0}")]
    Executor(String),

    /// The executor did not settle before the deadline
    #[error("timed out after {}s", .after.as_secs_f64())]
    Timeout {
        /// Time allowed
        after: Duration,
    },

    /// A dependency ended `Failed`
    #[error("dependency {dependency} failed")]
    DependencyFailed {
        /// The failed dependency
        dependency: TaskId,
    },

    /// A dependency had not settled when this task was reached
    #[error("dependency {dependency} has not settled")]
    DependencyUnsettled {
        /// The unsettled dependency
        dependency: TaskId,
    },
}

impl TaskFailure {
    /// Short kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskFailure::Executor(_) => "executor",
            TaskFailure::Timeout { .. } => "timeout",
            TaskFailure::DependencyFailed { .. } | TaskFailure::DependencyUnsettled { .. } => "propagated",
        }
    }

    /// Whether the executor was never invoked.
    pub fn is_propagated(&self) -> bool {
        self.kind() == "propagated"
    }
}
