//! Caller-level retries.
//!
//! A single [`Orchestrator::run`] never retries. [`run_with_retries`] re-runs
//! the failed subset as fresh tasks, treating everything completed so far as
//! settled, until nothing fails or `max_retries` extra passes are spent.

use autocrew_core::{Task, TaskId, TaskStatus};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::engine::{Orchestrator, RunResult};
use crate::error::OrchestratorError;

/// Retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra passes after the first
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Result of a run including its retry passes.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    /// Every pass, first to last
    pub passes: Vec<RunResult>,
    /// Final status per task
    pub final_status: HashMap<TaskId, TaskStatus>,
    /// Executor calls per task (propagated failures do not count)
    pub attempts: HashMap<TaskId, u32>,
    /// True iff every task ended completed
    pub overall_success: bool,
}

impl RetryOutcome {
    /// The last pass.
    pub fn last_pass(&self) -> Option<&RunResult> {
        self.passes.last()
    }
}

/// Run `tasks`, then retry failures up to `policy.max_retries` times.
pub async fn run_with_retries(
    orchestrator: &Orchestrator,
    tasks: Vec<Task>,
    policy: RetryPolicy,
) -> Result<RetryOutcome, OrchestratorError> {
    let originals = orchestrator.resolver().resolve(tasks)?;

    let mut final_status: HashMap<TaskId, TaskStatus> = HashMap::new();
    let mut attempts: HashMap<TaskId, u32> = HashMap::new();
    let mut completed: HashSet<TaskId> = HashSet::new();
    let mut passes = Vec::new();
    let mut batch: Vec<Task> = originals.iter().map(Task::fresh).collect();

    for pass in 0..=policy.max_retries {
        if pass > 0 {
            info!(pass, retrying = batch.len(), "retrying failed tasks");
            batch = orchestrator.resolver().resolve_with_settled(batch, &completed)?;
        }

        let result = orchestrator.run_with_settled(batch, &completed).await?;

        for report in &result.reports {
            final_status.insert(report.task_id.clone(), report.status);
            let dispatched = report.failure.as_ref().map_or(true, |f| !f.is_propagated());
            if dispatched {
                *attempts.entry(report.task_id.clone()).or_default() += 1;
            }
        }
        completed.extend(result.completed_ids());

        let failed: HashSet<TaskId> = result.failed_ids().into_iter().collect();
        passes.push(result);
        if failed.is_empty() {
            break;
        }

        batch = originals
            .iter()
            .filter(|t| failed.contains(&t.id))
            .map(Task::fresh)
            .collect();
    }

    let overall_success = final_status.values().all(|s| *s == TaskStatus::Completed);
    Ok(RetryOutcome {
        passes,
        final_status,
        attempts,
        overall_success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{orchestrator, three_tasks};
    use crate::executor::{Artifact, Executor, ExecutorRegistry, Outcome};
    use async_trait::async_trait;
    use autocrew_core::Category;
    use autocrew_storage::MemoryLedger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    /// Fails task `A` for the first `failures` calls.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Executor for Flaky {
        async fn execute(&self, task: &Task, _deadline: Instant) -> Outcome {
            if task.id.as_str() == "A" && self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Outcome::Failure("transient".to_string());
            }
            Outcome::Success(Artifact::new("ok"))
        }
    }

    fn flaky_orchestrator(failures: usize) -> Orchestrator {
        let executor = Arc::new(Flaky { failures, calls: AtomicUsize::new(0) });
        let registry = ExecutorRegistry::new().with(Category::Backend, executor);
        Orchestrator::new(registry, Arc::new(MemoryLedger::new()))
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let orch = flaky_orchestrator(1);
        let outcome = run_with_retries(&orch, three_tasks(), RetryPolicy::default()).await.unwrap();

        assert!(outcome.overall_success);
        assert_eq!(outcome.passes.len(), 2);
        assert_eq!(outcome.attempts[&TaskId::from("A")], 2);
        // B was propagated in pass one, executed once in pass two
        assert_eq!(outcome.attempts[&TaskId::from("B")], 1);
        assert_eq!(outcome.attempts[&TaskId::from("C")], 1);

        // second pass only carried the failed subset
        let second = outcome.last_pass().unwrap();
        let ids: Vec<_> = second.reports.iter().map(|r| r.task_id.to_string()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let orch = flaky_orchestrator(usize::MAX);
        let outcome = run_with_retries(&orch, three_tasks(), RetryPolicy { max_retries: 2 }).await.unwrap();

        assert!(!outcome.overall_success);
        assert_eq!(outcome.passes.len(), 3);
        assert_eq!(outcome.attempts[&TaskId::from("A")], 3);
        assert!(!outcome.attempts.contains_key(&TaskId::from("B")));
        assert_eq!(outcome.final_status[&TaskId::from("C")], TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_retry_when_all_pass() {
        let executor = Arc::new(crate::engine::tests::ScriptedExecutor::new());
        let orch = orchestrator(executor.clone(), Arc::new(MemoryLedger::new()));

        let outcome = run_with_retries(&orch, three_tasks(), RetryPolicy::default()).await.unwrap();
        assert_eq!(outcome.passes.len(), 1);
        assert_eq!(executor.calls(), 3);
    }
}
