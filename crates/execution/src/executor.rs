//! Executor capability and the category lookup table.

use async_trait::async_trait;
use autocrew_core::{Category, Task};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Whatever an executor produced. The engine does not interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    /// Raw content
    pub content: String,
}

impl Artifact {
    /// Wrap content.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

/// Settlement of one executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Work done
    Success(Artifact),
    /// Domain failure with a reason
    Failure(String),
}

/// Performs the work for one task category.
///
/// The orchestrator stops waiting at `deadline` and aborts the call. An
/// implementation must not leave shared state half-written when it is dropped
/// at an await point.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute `task`, finishing before `deadline` if possible.
    async fn execute(&self, task: &Task, deadline: Instant) -> Outcome;
}

/// Category to executor table supplied by the caller.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<Category, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the executor for `category`.
    pub fn register(&mut self, category: Category, executor: Arc<dyn Executor>) {
        self.executors.insert(category, executor);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, category: Category, executor: Arc<dyn Executor>) -> Self {
        self.register(category, executor);
        self
    }

    /// Executor for `category`.
    pub fn get(&self, category: Category) -> Option<Arc<dyn Executor>> {
        self.executors.get(&category).cloned()
    }

    /// Whether `category` has an executor.
    pub fn contains(&self, category: Category) -> bool {
        self.executors.contains_key(&category)
    }

    /// Registered categories in [`Category::ALL`] order.
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL.into_iter().filter(|c| self.contains(*c)).collect()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("categories", &self.categories())
            .finish()
    }
}
