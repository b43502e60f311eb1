//! In-memory ledger.

use async_trait::async_trait;
use autocrew_core::{TaskId, TaskStatus};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{Ledger, Result};

/// Ledger that keeps marks in memory, for dry runs and tests.
#[derive(Default)]
pub struct MemoryLedger {
    marks: Mutex<Vec<(TaskId, TaskStatus)>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mark in call order.
    pub async fn history(&self) -> Vec<(TaskId, TaskStatus)> {
        self.marks.lock().await.clone()
    }

    /// Latest status recorded per task.
    pub async fn latest(&self) -> HashMap<TaskId, TaskStatus> {
        self.marks.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn mark(&self, id: &TaskId, status: TaskStatus) -> Result<()> {
        self.marks.lock().await.push((id.clone(), status));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_keeps_last_mark() {
        let ledger = MemoryLedger::new();
        let id = TaskId::from("A");
        ledger.mark(&id, TaskStatus::Failed).await.unwrap();
        ledger.mark(&id, TaskStatus::Completed).await.unwrap();

        assert_eq!(ledger.history().await.len(), 2);
        assert_eq!(ledger.latest().await[&id], TaskStatus::Completed);
    }
}
