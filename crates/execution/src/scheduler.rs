//! Time budget and concurrency limits.

use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::OrchestratorError;

/// Deadlines further out than this are clamped.
const MAX_ALLOWANCE: Duration = Duration::from_secs(86_400 * 365);

/// Budget for task execution.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    /// Deadline = estimate * multiplier
    pub timeout_multiplier: f64,
    /// Max concurrent tasks
    pub max_concurrent: NonZeroUsize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            timeout_multiplier: 1.5,
            max_concurrent: NonZeroUsize::MIN,
        }
    }
}

impl Budget {
    /// Create a new budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overrun tolerance.
    pub fn with_timeout_multiplier(mut self, multiplier: f64) -> Self {
        self.timeout_multiplier = multiplier;
        self
    }

    /// Set max concurrent tasks.
    pub fn with_max_concurrent(mut self, max: NonZeroUsize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Reject multipliers that are not finite and positive.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if !self.timeout_multiplier.is_finite() || self.timeout_multiplier <= 0.0 {
            return Err(OrchestratorError::InvalidBudget(format!(
                "timeout multiplier must be positive, got {}",
                self.timeout_multiplier
            )));
        }
        Ok(())
    }

    /// Time a task with this estimate is allowed to run.
    pub fn allowance(&self, estimate: Duration) -> Duration {
        Duration::try_from_secs_f64(estimate.as_secs_f64() * self.timeout_multiplier)
            .map(|d| d.min(MAX_ALLOWANCE))
            .unwrap_or(MAX_ALLOWANCE)
    }

    /// Deadline for a task starting at `start`.
    pub fn deadline(&self, start: Instant, estimate: Duration) -> Instant {
        start + self.allowance(estimate)
    }

    /// Whether tasks may run in parallel.
    pub fn is_parallel(&self) -> bool {
        self.max_concurrent.get() > 1
    }
}
