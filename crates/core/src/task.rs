//! Task model - the core unit of work in autocrew.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;
use crate::id::TaskId;

/// A task represents one declared unit of work.
///
/// Everything except `status` is fixed at construction. Status only moves
/// forward through [`Task::advance`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Free-text label
    pub description: String,

    /// Selects the executor that handles this task
    pub category: Category,

    /// Tie-break weight among tasks that are ready at the same time
    pub priority: Priority,

    /// Tasks that must complete before this one may start
    pub dependencies: Vec<TaskId>,

    /// Estimate used to derive the execution deadline
    pub estimated_duration: Duration,

    /// Human-readable acceptance criteria (not evaluated)
    pub validation_criteria: Vec<String>,

    status: TaskStatus,
}

impl Task {
    /// Create a pending task.
    ///
    /// Fails when `estimated_duration` is zero. Repeated dependency ids are
    /// collapsed, keeping first-seen order.
    pub fn new(
        id: impl Into<TaskId>,
        description: impl Into<String>,
        category: Category,
        priority: Priority,
        estimated_duration: Duration,
    ) -> Result<Self, CoreError> {
        let id = id.into();
        if estimated_duration.is_zero() {
            return Err(CoreError::InvalidDuration(id));
        }

        Ok(Self {
            id,
            description: description.into(),
            category,
            priority,
            dependencies: Vec::new(),
            estimated_duration,
            validation_criteria: Vec::new(),
            status: TaskStatus::Pending,
        })
    }

    /// Set the dependency list.
    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies.clear();
        for dep in deps {
            let dep = dep.into();
            if !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
        self
    }

    /// Set the validation criteria.
    pub fn with_validation_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validation_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Move to `next`, rejecting anything but a forward transition.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), CoreError> {
        if !self.status.can_advance_to(next) {
            return Err(CoreError::InvalidTransition {
                task: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Copy of this task reset to `Pending`, for a fresh run.
    pub fn fresh(&self) -> Self {
        Self {
            status: TaskStatus::Pending,
            ..self.clone()
        }
    }
}

/// Which executor handles a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// UI work
    Frontend,
    /// Server-side work
    Backend,
    /// Accessibility compliance
    Accessibility,
    /// Test suites
    Testing,
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Category; 4] = [
        Category::Frontend,
        Category::Backend,
        Category::Accessibility,
        Category::Testing,
    ];

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Frontend => "frontend",
            Category::Backend => "backend",
            Category::Accessibility => "accessibility",
            Category::Testing => "testing",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Lowest
    Low,
    /// Normal
    Medium,
    /// Important
    High,
    /// Must run first when nothing else constrains the order
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Execution status of a task within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not yet dispatched
    Pending,
    /// Executor call in flight
    Running,
    /// Executor reported success
    Completed,
    /// Executor failed, timed out, or a dependency failed
    Failed,
}

impl TaskStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Upper-case label used in the compliance ledger.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    fn can_advance_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> Task {
        Task::new(id, "test", Category::Backend, Priority::Medium, Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_new_task_is_pending() {
        assert_eq!(task("A").status(), TaskStatus::Pending);
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = Task::new("A", "x", Category::Frontend, Priority::Low, Duration::ZERO).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDuration(id) if id.as_str() == "A"));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_forward_transitions() {
        let mut t = task("A");
        t.advance(TaskStatus::Running).unwrap();
        t.advance(TaskStatus::Completed).unwrap();
        assert!(t.status().is_terminal());

        let mut propagated = task("B");
        propagated.advance(TaskStatus::Failed).unwrap();
        assert_eq!(propagated.status(), TaskStatus::Failed);
    }

    #[test]
    fn test_terminal_task_cannot_reenter() {
        let mut t = task("A");
        t.advance(TaskStatus::Running).unwrap();
        t.advance(TaskStatus::Failed).unwrap();

        assert!(t.advance(TaskStatus::Running).is_err());
        assert!(t.advance(TaskStatus::Pending).is_err());
        assert!(t.advance(TaskStatus::Completed).is_err());
        assert_eq!(t.status(), TaskStatus::Failed);
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut t = task("A");
        assert!(t.advance(TaskStatus::Completed).is_err());
    }

    #[test]
    fn test_dependencies_deduplicated() {
        let t = task("C").with_dependencies(["A", "B", "A"]);
        let deps: Vec<_> = t.dependencies.iter().map(|d| d.as_str()).collect();
        assert_eq!(deps, vec!["A", "B"]);
    }

    #[test]
    fn test_fresh_resets_status() {
        let mut t = task("A");
        t.advance(TaskStatus::Failed).unwrap();
        assert_eq!(t.fresh().status(), TaskStatus::Pending);
    }
}
