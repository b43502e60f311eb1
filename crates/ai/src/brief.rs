//! Prompt construction - one role per category, one brief per task.

use autocrew_core::{Category, Task};
use std::fmt::Write;

/// The role an executor takes on for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    /// Short role title
    pub role: &'static str,
    /// What the role is accountable for
    pub goal: &'static str,
    /// Stack and practices the role works in
    pub expertise: &'static str,
}

impl Persona {
    /// Persona for `category`.
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Frontend => Persona {
                role: "Senior Frontend Developer",
                goal: "Ship production-ready React and TypeScript features without waiting for review.",
                expertise: "React 18 patterns, strict TypeScript, React-Leaflet maps, mobile-first layout, PWA features",
            },
            Category::Backend => Persona {
                role: "Senior Backend Engineer",
                goal: "Build robust server-side systems and make the architecture calls yourself.",
                expertise: "Express with TypeScript, input validation, file processing, API design, query tuning, security",
            },
            Category::Accessibility => Persona {
                role: "Accessibility Compliance Expert",
                goal: "Reach WCAG 2.1 AA compliance and decide the implementation independently.",
                expertise: "WCAG 2.1, ARIA patterns, screen readers, keyboard navigation, cognitive accessibility",
            },
            Category::Testing => Persona {
                role: "Senior Test Engineer",
                goal: "Cover the feature with tests that fail for the right reasons.",
                expertise: "unit and integration suites, fixtures, coverage analysis, flaky test triage",
            },
        }
    }
}

/// Builds the system prompt and user message for a task.
pub struct TaskBrief;

impl TaskBrief {
    /// Role prompt for the task's category.
    pub fn system_prompt(category: Category) -> String {
        let persona = Persona::for_category(category);
        format!(
            "You are an autonomous {}. {} You work in: {}. \
             Make every technical decision yourself and deliver a complete implementation.",
            persona.role, persona.goal, persona.expertise
        )
    }

    /// User message describing the work.
    pub fn render(task: &Task) -> String {
        let mut brief = String::new();
        let _ = writeln!(brief, "TASK: {}", task.id);
        let _ = writeln!(brief, "DESCRIPTION: {}", task.description);
        let _ = writeln!(brief, "PRIORITY: {}", task.priority);
        brief.push('\n');
        brief.push_str("Implement this feature end to end:\n");
        for expectation in [
            "make all technical decisions independently",
            "keep the result production-ready",
            "handle errors explicitly",
            "build accessibility in from the start",
            "include tests for the new behaviour",
        ] {
            let _ = writeln!(brief, "- {expectation}");
        }

        if !task.validation_criteria.is_empty() {
            brief.push_str("\nVALIDATION CRITERIA:\n");
            for criterion in &task.validation_criteria {
                let _ = writeln!(brief, "- {criterion}");
            }
        }

        brief.push_str("\nReply with the implementation.");
        brief
    }
}
