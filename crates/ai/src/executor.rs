//! `Executor` backed by the Messages API.

use async_trait::async_trait;
use autocrew_core::{Category, Task};
use autocrew_execution::{Artifact, Executor, ExecutorRegistry, Outcome};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::brief::TaskBrief;
use crate::client::AnthropicClient;
use crate::error::AiError;

/// Runs a task by asking the model to implement it.
#[derive(Clone)]
pub struct LlmExecutor {
    client: AnthropicClient,
}

impl LlmExecutor {
    /// Wrap a client.
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }

    /// A registry with this executor serving every category.
    pub fn registry(self) -> ExecutorRegistry {
        let executor: Arc<dyn Executor> = Arc::new(self);
        Category::ALL
            .iter()
            .fold(ExecutorRegistry::new(), |registry, category| {
                registry.with(*category, executor.clone())
            })
    }
}

#[async_trait]
impl Executor for LlmExecutor {
    async fn execute(&self, task: &Task, deadline: Instant) -> Outcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Outcome::Failure(AiError::DeadlineExceeded.to_string());
        }
        let timeout = remaining.min(self.client.config().timeout);

        let system = TaskBrief::system_prompt(task.category);
        let prompt = TaskBrief::render(task);

        match self.client.complete(&system, &prompt, timeout).await {
            Ok(text) => {
                info!(task = %task.id, reply_chars = text.len(), "model replied");
                Outcome::Success(Artifact::new(text))
            }
            Err(e) => {
                warn!(task = %task.id, error = %e, timeout = e.is_timeout(), "model call failed");
                Outcome::Failure(e.to_string())
            }
        }
    }
}
