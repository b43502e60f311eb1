//! The orchestrator - walks the resolved order and drives each task.

use autocrew_core::{Task, TaskId, TaskStatus};
use autocrew_storage::Ledger;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dependency::{DependencyResolver, FailurePolicy, Readiness};
use crate::error::{OrchestratorError, TaskFailure};
use crate::executor::{Artifact, Executor, ExecutorRegistry, Outcome};
use crate::scheduler::Budget;

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    /// Deadline and concurrency limits
    pub budget: Budget,
    /// Handling of tasks whose dependency failed
    pub failure_policy: FailurePolicy,
}

/// Final state of one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// Task id
    pub task_id: TaskId,
    /// Terminal status
    pub status: TaskStatus,
    /// Reason, when failed
    pub failure: Option<TaskFailure>,
    /// Executor output, when completed
    pub artifact: Option<Artifact>,
    /// Time spent waiting on the executor
    pub elapsed: Duration,
}

impl TaskReport {
    fn propagated(task_id: TaskId, failure: TaskFailure) -> Self {
        Self {
            task_id,
            status: TaskStatus::Failed,
            failure: Some(failure),
            artifact: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// One report per task, in the order the tasks were supplied
    pub reports: Vec<TaskReport>,
    /// True iff every task completed
    pub overall_success: bool,
}

impl RunResult {
    pub(crate) fn from_reports(reports: Vec<TaskReport>) -> Self {
        let overall_success = reports.iter().all(|r| r.status == TaskStatus::Completed);
        Self { reports, overall_success }
    }

    /// Status of every task.
    pub fn per_task_status(&self) -> HashMap<TaskId, TaskStatus> {
        self.reports.iter().map(|r| (r.task_id.clone(), r.status)).collect()
    }

    /// Status of one task.
    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.report(id).map(|r| r.status)
    }

    /// Report for one task.
    pub fn report(&self, id: &TaskId) -> Option<&TaskReport> {
        self.reports.iter().find(|r| &r.task_id == id)
    }

    /// Ids of failed tasks.
    pub fn failed_ids(&self) -> Vec<TaskId> {
        self.reports
            .iter()
            .filter(|r| r.status == TaskStatus::Failed)
            .map(|r| r.task_id.clone())
            .collect()
    }

    /// Ids of completed tasks.
    pub fn completed_ids(&self) -> Vec<TaskId> {
        self.reports
            .iter()
            .filter(|r| r.status == TaskStatus::Completed)
            .map(|r| r.task_id.clone())
            .collect()
    }
}

/// How an executor call ended.
pub(crate) enum Settlement {
    Completed(Artifact),
    Failed(TaskFailure),
}

/// Drives tasks through their executors and records the results.
///
/// ```text
/// Resolve → for each task: check deps → execute under deadline → settle → mark ledger
/// ```
pub struct Orchestrator {
    registry: ExecutorRegistry,
    ledger: Arc<dyn Ledger>,
    resolver: DependencyResolver,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator with the default configuration.
    pub fn new(registry: ExecutorRegistry, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            registry,
            ledger,
            resolver: DependencyResolver::new(),
            config: OrchestratorConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// The resolver used by [`resolve_and_run`](Self::resolve_and_run).
    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// Resolve `tasks`, then run them.
    pub async fn resolve_and_run(&self, tasks: Vec<Task>) -> Result<RunResult, OrchestratorError> {
        let ordered = self.resolver.resolve(tasks)?;
        self.run(ordered).await
    }

    /// Run tasks in the order given.
    ///
    /// Errors only come from the pre-dispatch checks; once the first task is
    /// dispatched every failure is folded into the result.
    pub async fn run(&self, tasks: Vec<Task>) -> Result<RunResult, OrchestratorError> {
        self.run_with_settled(tasks, &HashSet::new()).await
    }

    /// Run tasks whose dependencies may include ids `settled` by an earlier run.
    pub async fn run_with_settled(
        &self,
        tasks: Vec<Task>,
        settled: &HashSet<TaskId>,
    ) -> Result<RunResult, OrchestratorError> {
        self.preflight(&tasks)?;

        info!(
            tasks = tasks.len(),
            max_concurrent = self.config.budget.max_concurrent.get(),
            "starting run"
        );

        let result = if self.config.budget.is_parallel() {
            self.run_concurrent(tasks, settled).await
        } else {
            self.run_sequential(tasks, settled).await
        };

        info!(
            completed = result.completed_ids().len(),
            failed = result.failed_ids().len(),
            success = result.overall_success,
            "run finished"
        );
        Ok(result)
    }

    fn preflight(&self, tasks: &[Task]) -> Result<(), OrchestratorError> {
        self.config.budget.validate()?;

        let mut seen = HashSet::with_capacity(tasks.len());
        for task in tasks {
            if !seen.insert(&task.id) {
                return Err(OrchestratorError::DuplicateTask(task.id.clone()));
            }
            if task.status() != TaskStatus::Pending {
                return Err(OrchestratorError::NotPending(task.id.clone()));
            }
            if !self.registry.contains(task.category) {
                return Err(OrchestratorError::MissingExecutor {
                    category: task.category,
                    task: task.id.clone(),
                });
            }
        }
        Ok(())
    }

    async fn run_sequential(&self, tasks: Vec<Task>, settled: &HashSet<TaskId>) -> RunResult {
        let mut statuses: HashMap<TaskId, TaskStatus> =
            tasks.iter().map(|t| (t.id.clone(), t.status())).collect();
        let mut reports = Vec::with_capacity(tasks.len());

        for mut task in tasks {
            let readiness = self
                .resolver
                .check(&task, &statuses, settled, self.config.failure_policy);

            let report = match readiness {
                Readiness::Ready => self.dispatch(&mut task).await,
                Readiness::DependencyFailed(dependency) => {
                    self.propagate(&mut task, TaskFailure::DependencyFailed { dependency })
                }
                Readiness::Waiting(dependency) | Readiness::Unsettled(dependency) => {
                    self.propagate(&mut task, TaskFailure::DependencyUnsettled { dependency })
                }
            };

            statuses.insert(task.id.clone(), report.status);
            self.record(&report).await;
            reports.push(report);
        }

        RunResult::from_reports(reports)
    }

    async fn dispatch(&self, task: &mut Task) -> TaskReport {
        let Some(executor) = self.registry.get(task.category) else {
            return self.propagate(
                task,
                TaskFailure::Executor(format!("no executor for category {}", task.category)),
            );
        };

        advance(task, TaskStatus::Running);
        let started = Instant::now();
        let deadline = self.config.budget.deadline(started, task.estimated_duration);

        info!(
            task = %task.id,
            category = %task.category,
            priority = %task.priority,
            allowance_secs = self.config.budget.allowance(task.estimated_duration).as_secs(),
            "executing task"
        );

        let settlement = execute_with_deadline(executor, task.clone(), started, deadline).await;
        self.settle(task, settlement, started.elapsed())
    }

    pub(crate) fn settle(&self, task: &mut Task, settlement: Settlement, elapsed: Duration) -> TaskReport {
        match settlement {
            Settlement::Completed(artifact) => {
                advance(task, TaskStatus::Completed);
                info!(task = %task.id, elapsed_ms = elapsed.as_millis() as u64, "task completed");
                TaskReport {
                    task_id: task.id.clone(),
                    status: TaskStatus::Completed,
                    failure: None,
                    artifact: Some(artifact),
                    elapsed,
                }
            }
            Settlement::Failed(failure) => {
                advance(task, TaskStatus::Failed);
                warn!(task = %task.id, kind = failure.kind(), reason = %failure, "task failed");
                TaskReport {
                    task_id: task.id.clone(),
                    status: TaskStatus::Failed,
                    failure: Some(failure),
                    artifact: None,
                    elapsed,
                }
            }
        }
    }

    pub(crate) fn propagate(&self, task: &mut Task, failure: TaskFailure) -> TaskReport {
        advance(task, TaskStatus::Failed);
        warn!(task = %task.id, reason = %failure, "skipping task");
        TaskReport::propagated(task.id.clone(), failure)
    }

    /// Write a terminal status to the ledger. Failures are logged only.
    pub(crate) async fn record(&self, report: &TaskReport) {
        if let Err(e) = self.ledger.mark(&report.task_id, report.status).await {
            warn!(task = %report.task_id, error = %e, "could not update ledger");
        }
    }

    pub(crate) fn check(
        &self,
        task: &Task,
        statuses: &HashMap<TaskId, TaskStatus>,
        settled: &HashSet<TaskId>,
    ) -> Readiness {
        self.resolver.check(task, statuses, settled, self.config.failure_policy)
    }
}

/// Preflight admits only pending tasks, so every transition made here is legal.
fn advance(task: &mut Task, next: TaskStatus) {
    let result = task.advance(next);
    if let Err(e) = &result {
        error!(task = %task.id, error = %e, "status transition rejected");
    }
    debug_assert!(result.is_ok(), "invalid status transition for task {} to {}", task.id, next);
}

/// Aborts the spawned executor call when dropped, so a cancelled run does not
/// leave it running unobserved.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one executor call on its own tokio task and stop waiting at `deadline`.
///
/// The call is aborted on timeout and whenever this future is dropped; an
/// executor that never reaches an await point keeps its worker thread but no
/// longer holds up the run.
pub(crate) async fn execute_with_deadline(
    executor: Arc<dyn Executor>,
    task: Task,
    started: Instant,
    deadline: Instant,
) -> Settlement {
    let id = task.id.clone();
    let mut handle = AbortOnDrop(tokio::spawn(async move { executor.execute(&task, deadline).await }));

    match tokio::time::timeout_at(deadline, &mut handle.0).await {
        Ok(Ok(Outcome::Success(artifact))) => Settlement::Completed(artifact),
        Ok(Ok(Outcome::Failure(reason))) => Settlement::Failed(TaskFailure::Executor(reason)),
        Ok(Err(join_error)) => {
            let reason = if join_error.is_panic() {
                "executor panicked".to_string()
            } else {
                "executor was cancelled".to_string()
            };
            Settlement::Failed(TaskFailure::Executor(reason))
        }
        Err(_) => {
            drop(handle);
            debug!(task = %id, "deadline exceeded, executor aborted");
            Settlement::Failed(TaskFailure::Timeout {
                after: deadline.saturating_duration_since(started),
            })
        }
    }
}
