//! Run summaries for the terminal and for `--json`.

use autocrew_core::{TaskId, TaskStatus};
use autocrew_execution::{RetryOutcome, TaskReport};
use serde::Serialize;
use std::collections::HashMap;

/// Final state of one task across all passes.
#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub status: &'static str,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

/// Whole-run summary.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub success: bool,
    pub passes: usize,
    pub tasks: Vec<TaskSummary>,
}

impl RunSummary {
    /// Summarize, listing tasks in the order of the first pass.
    pub fn from_outcome(outcome: &RetryOutcome) -> Self {
        let mut latest: HashMap<&TaskId, &TaskReport> = HashMap::new();
        for report in outcome.passes.iter().flat_map(|p| &p.reports) {
            latest.insert(&report.task_id, report);
        }

        let tasks = outcome
            .passes
            .first()
            .map(|first| first.reports.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|r| latest.get(&r.task_id).copied())
            .map(|report| TaskSummary {
                id: report.task_id.to_string(),
                status: report.status.label(),
                attempts: outcome.attempts.get(&report.task_id).copied().unwrap_or(0),
                failure_kind: report.failure.as_ref().map(|f| f.kind()),
                failure: report.failure.as_ref().map(|f| f.to_string()),
                elapsed_ms: report.elapsed.as_millis() as u64,
                artifact: report.artifact.as_ref().map(|a| a.content.clone()),
            })
            .collect();

        Self {
            success: outcome.overall_success,
            passes: outcome.passes.len(),
            tasks,
        }
    }

    /// Plain-text rendering, one line per task.
    pub fn render(&self) -> String {
        let width = self.tasks.iter().map(|t| t.id.len()).max().unwrap_or(0);
        let mut out = String::new();
        for task in &self.tasks {
            let detail = match (&task.failure, task.status) {
                (Some(reason), _) => reason.clone(),
                (None, label) if label == TaskStatus::Completed.label() => {
                    format!("{:.1}s", task.elapsed_ms as f64 / 1000.0)
                }
                (None, _) => String::new(),
            };
            out.push_str(&format!(
                "{:<width$}  {:<9}  attempts={}  {}\n",
                task.id, task.status, task.attempts, detail
            ));
        }
        let completed = self.tasks.iter().filter(|t| t.status == TaskStatus::Completed.label()).count();
        out.push_str(&format!(
            "{}/{} completed in {} pass(es)\n",
            completed,
            self.tasks.len(),
            self.passes
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocrew_execution::{Artifact, RunResult, TaskFailure};
    use std::time::Duration;

    fn report(id: &str, failure: Option<TaskFailure>) -> TaskReport {
        TaskReport {
            task_id: TaskId::from(id),
            status: if failure.is_some() { TaskStatus::Failed } else { TaskStatus::Completed },
            artifact: failure.is_none().then(|| Artifact::new("done")),
            failure,
            elapsed: Duration::from_millis(1500),
        }
    }

    fn pass(reports: Vec<TaskReport>) -> RunResult {
        let overall_success = reports.iter().all(|r| r.status == TaskStatus::Completed);
        RunResult { reports, overall_success }
    }

    #[test]
    fn test_summary_uses_latest_pass() {
        let outcome = RetryOutcome {
            passes: vec![
                pass(vec![
                    report("A", Some(TaskFailure::Executor("flaky".into()))),
                    report("B", Some(TaskFailure::DependencyFailed { dependency: TaskId::from("A") })),
                    report("C", None),
                ]),
                pass(vec![report("A", None), report("B", None)]),
            ],
            final_status: HashMap::new(),
            attempts: [("A", 2), ("B", 1), ("C", 1)]
                .into_iter()
                .map(|(id, n)| (TaskId::from(id), n))
                .collect(),
            overall_success: true,
        };

        let summary = RunSummary::from_outcome(&outcome);
        let ids: Vec<_> = summary.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!(summary.tasks.iter().all(|t| t.status == "COMPLETED"));
        assert_eq!(summary.tasks[0].attempts, 2);
        assert_eq!(summary.passes, 2);

        let text = summary.render();
        assert!(text.ends_with("3/3 completed in 2 pass(es)\n"));
    }

    #[test]
    fn test_json_shape() {
        let outcome = RetryOutcome {
            passes: vec![pass(vec![report(
                "MP-1",
                Some(TaskFailure::Timeout { after: Duration::from_secs(5400) }),
            )])],
            final_status: HashMap::new(),
            attempts: HashMap::new(),
            overall_success: false,
        };

        let json = serde_json::to_value(RunSummary::from_outcome(&outcome)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["tasks"][0]["status"], "FAILED");
        assert_eq!(json["tasks"][0]["failure_kind"], "timeout");
        assert_eq!(json["tasks"][0]["failure"], "timed out after 5400s");
        assert!(json["tasks"][0].get("artifact").is_none());
    }
}
