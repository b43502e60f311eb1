//! Execution layer - dependency resolution, deadlines, and the orchestrator.

#![warn(missing_docs)]

pub mod dependency;
pub mod engine;
pub mod error;
pub mod executor;
mod parallel;
pub mod retry;
pub mod scheduler;

pub use dependency::{DependencyResolver, FailurePolicy, Readiness};
pub use engine::{Orchestrator, OrchestratorConfig, RunResult, TaskReport};
pub use error::{OrchestratorError, ResolveError, TaskFailure};
pub use executor::{Artifact, Executor, ExecutorRegistry, Outcome};
pub use retry::{run_with_retries, RetryOutcome, RetryPolicy};
pub use scheduler::Budget;
