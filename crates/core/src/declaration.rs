//! Static task declarations.
//!
//! A run starts from a JSON array of [`TaskDeclaration`]s. When no file is
//! given, [`builtin_queue`] supplies the default queue.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::CoreError;
use crate::id::TaskId;
use crate::task::{Category, Priority, Task};

/// Serialized form of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDeclaration {
    /// Ticket id
    pub id: TaskId,
    /// Free-text label
    pub description: String,
    /// Executor category
    pub category: Category,
    /// Priority
    pub priority: Priority,
    /// Ids that must complete first
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Estimate in minutes
    pub estimated_minutes: u64,
    /// Acceptance criteria
    #[serde(default)]
    pub validation_criteria: Vec<String>,
}

impl TaskDeclaration {
    /// Build a pending task.
    pub fn into_task(self) -> Result<Task, CoreError> {
        let task = Task::new(
            self.id,
            self.description,
            self.category,
            self.priority,
            Duration::from_secs(self.estimated_minutes.saturating_mul(60)),
        )?;
        Ok(task
            .with_dependencies(self.dependencies)
            .with_validation_criteria(self.validation_criteria))
    }
}

/// Parse declarations from a JSON string.
pub fn parse_declarations(json: &str) -> Result<Vec<Task>, CoreError> {
    let decls: Vec<TaskDeclaration> = serde_json::from_str(json)?;
    decls.into_iter().map(TaskDeclaration::into_task).collect()
}

/// Load declarations from a JSON file.
pub fn load_declarations(path: impl AsRef<Path>) -> Result<Vec<Task>, CoreError> {
    let content = std::fs::read_to_string(path)?;
    parse_declarations(&content)
}

/// The default task queue.
pub fn builtin_queue() -> Vec<TaskDeclaration> {
    vec![
        TaskDeclaration {
            id: TaskId::from("MP-3"),
            description: "Draggable Markers with Advanced UX".to_string(),
            category: Category::Frontend,
            priority: Priority::Critical,
            dependencies: vec![],
            estimated_minutes: 45,
            validation_criteria: vec![
                "All markers draggable on desktop and mobile".to_string(),
                "Real-time coordinate updates with validation".to_string(),
                "Accessibility compliance (keyboard navigation)".to_string(),
                "Performance optimized for 10,000+ markers".to_string(),
            ],
        },
        TaskDeclaration {
            id: TaskId::from("MP-1"),
            description: "CSV Import/Export with Comprehensive Validation".to_string(),
            category: Category::Backend,
            priority: Priority::Critical,
            dependencies: vec![],
            estimated_minutes: 60,
            validation_criteria: vec![
                "File format validation with detailed error reporting".to_string(),
                "Coordinate range validation".to_string(),
                "Large file support (streaming for 50MB+ files)".to_string(),
                "Template mode for field mapping".to_string(),
            ],
        },
        TaskDeclaration {
            id: TaskId::from("MP-4"),
            description: "WCAG 2.1 AA Accessibility Implementation".to_string(),
            category: Category::Accessibility,
            priority: Priority::High,
            dependencies: vec![TaskId::from("MP-3")],
            estimated_minutes: 90,
            validation_criteria: vec![
                "ARIA landmarks and roles implemented".to_string(),
                "Keyboard navigation for all interactions".to_string(),
                "Screen reader compatibility verified".to_string(),
                "Color contrast ratios meet WCAG AA".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use std::io::Write;

    #[test]
    fn test_parse_with_defaults() {
        let json = r#"[
            {"id": "A", "description": "first", "category": "frontend",
             "priority": "critical", "estimated_minutes": 10},
            {"id": "B", "description": "second", "category": "testing",
             "priority": "low", "dependencies": ["A"], "estimated_minutes": 2,
             "validation_criteria": ["passes"]}
        ]"#;

        let tasks = parse_declarations(json).unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].dependencies.is_empty());
        assert_eq!(tasks[0].estimated_duration, Duration::from_secs(600));
        assert_eq!(tasks[1].category, Category::Testing);
        assert_eq!(tasks[1].dependencies, vec![TaskId::from("A")]);
        assert_eq!(tasks[1].validation_criteria, vec!["passes".to_string()]);
        assert!(tasks.iter().all(|t| t.status() == TaskStatus::Pending));
    }

    #[test]
    fn test_zero_minutes_rejected() {
        let json = r#"[{"id": "A", "description": "x", "category": "backend",
                        "priority": "high", "estimated_minutes": 0}]"#;
        assert!(matches!(parse_declarations(json), Err(CoreError::InvalidDuration(_))));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let json = r#"[{"id": "A", "description": "x", "category": "devops",
                        "priority": "high", "estimated_minutes": 5}]"#;
        assert!(matches!(parse_declarations(json), Err(CoreError::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&builtin_queue()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let tasks = load_declarations(file.path()).unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["MP-3", "MP-1", "MP-4"]);
    }

    #[test]
    fn test_builtin_queue_dependencies() {
        let queue = builtin_queue();
        let mp4 = queue.iter().find(|d| d.id.as_str() == "MP-4").unwrap();
        assert_eq!(mp4.dependencies, vec![TaskId::from("MP-3")]);
        assert_eq!(mp4.estimated_minutes, 90);
    }
}
