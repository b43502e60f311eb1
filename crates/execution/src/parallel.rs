//! Bounded-parallel run mode.
//!
//! Siblings in the dependency order run at the same time, each under its own
//! deadline. A task is released only once every dependency is terminal, and
//! at most `max_concurrent` executor calls are in flight. Ledger writes stay
//! on the orchestrator's loop, one at a time.

use autocrew_core::{Task, TaskId, TaskStatus};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info};

use crate::dependency::Readiness;
use crate::engine::{execute_with_deadline, Orchestrator, RunResult, Settlement, TaskReport};
use crate::error::TaskFailure;

impl Orchestrator {
    pub(crate) async fn run_concurrent(&self, mut tasks: Vec<Task>, settled: &HashSet<TaskId>) -> RunResult {
        let limit = self.config().budget.max_concurrent.get();
        let mut statuses: HashMap<TaskId, TaskStatus> =
            tasks.iter().map(|t| (t.id.clone(), t.status())).collect();
        let mut reports: Vec<Option<TaskReport>> = vec![None; tasks.len()];
        let mut in_flight: JoinSet<(usize, Settlement, Duration)> = JoinSet::new();

        loop {
            // Release or propagate until nothing changes; a propagated failure
            // can unblock further propagation in the same pass.
            let mut changed = true;
            while changed {
                changed = false;
                for idx in 0..tasks.len() {
                    if tasks[idx].status() != TaskStatus::Pending {
                        continue;
                    }

                    let report = match self.check(&tasks[idx], &statuses, settled) {
                        Readiness::Waiting(_) => continue,
                        Readiness::Ready => {
                            if in_flight.len() >= limit {
                                continue;
                            }
                            changed = true;
                            match self.release(&mut tasks[idx], idx, &mut in_flight) {
                                None => {
                                    statuses.insert(tasks[idx].id.clone(), tasks[idx].status());
                                    continue;
                                }
                                Some(rejected) => rejected,
                            }
                        }
                        Readiness::DependencyFailed(dependency) => {
                            self.propagate(&mut tasks[idx], TaskFailure::DependencyFailed { dependency })
                        }
                        Readiness::Unsettled(dependency) => {
                            self.propagate(&mut tasks[idx], TaskFailure::DependencyUnsettled { dependency })
                        }
                    };

                    statuses.insert(report.task_id.clone(), report.status);
                    self.record(&report).await;
                    reports[idx] = Some(report);
                    changed = true;
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((idx, settlement, elapsed)) => {
                    let report = self.settle(&mut tasks[idx], settlement, elapsed);
                    statuses.insert(report.task_id.clone(), report.status);
                    self.record(&report).await;
                    reports[idx] = Some(report);
                }
                Err(e) => error!(error = %e, "task worker failed"),
            }
        }

        // Anything still pending waits on a task that can never settle (a
        // cycle in an unresolved input); anything running lost its worker.
        for (idx, task) in tasks.iter_mut().enumerate() {
            if reports[idx].is_some() {
                continue;
            }
            let report = match task.status() {
                TaskStatus::Running => self.settle(
                    task,
                    Settlement::Failed(TaskFailure::Executor("task worker was lost".to_string())),
                    Duration::ZERO,
                ),
                _ => {
                    let dependency = task
                        .dependencies
                        .iter()
                        .find(|d| statuses.get(*d).is_some_and(|s| !s.is_terminal()))
                        .or(task.dependencies.first())
                        .cloned()
                        .unwrap_or_else(|| task.id.clone());
                    self.propagate(task, TaskFailure::DependencyUnsettled { dependency })
                }
            };
            statuses.insert(report.task_id.clone(), report.status);
            self.record(&report).await;
            reports[idx] = Some(report);
        }

        RunResult::from_reports(reports.into_iter().flatten().collect())
    }

    /// Spawn the executor call for `task`. Returns a report instead when the
    /// task cannot be released.
    fn release(
        &self,
        task: &mut Task,
        idx: usize,
        in_flight: &mut JoinSet<(usize, Settlement, Duration)>,
    ) -> Option<TaskReport> {
        let Some(executor) = self.registry().get(task.category) else {
            return Some(self.propagate(
                task,
                TaskFailure::Executor(format!("no executor for category {}", task.category)),
            ));
        };

        if let Err(e) = task.advance(TaskStatus::Running) {
            error!(task = %task.id, error = %e, "status transition rejected");
            return None;
        }

        let started = Instant::now();
        let deadline = self.config().budget.deadline(started, task.estimated_duration);
        info!(task = %task.id, category = %task.category, in_flight = in_flight.len() + 1, "releasing task");

        let snapshot = task.clone();
        in_flight.spawn(async move {
            let settlement = execute_with_deadline(executor, snapshot, started, deadline).await;
            (idx, settlement, started.elapsed())
        });
        None
    }
}
