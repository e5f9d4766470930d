//! Batch selection and outcome resolution for one publish cycle.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info, warn};

use crate::{
    CycleReport, PublishOutcome, RetryAction, RetryPolicy, SchedulerError, Task, TaskStatus,
    TaskStore, WorkerPool,
};

/// Statuses a cycle may select from.
const ELIGIBLE_STATUSES: [TaskStatus; 2] = [TaskStatus::Pending, TaskStatus::Retrying];

/// Pulls eligible tasks, hands them to the worker pool, and persists
/// the resulting transitions.
pub struct BatchDispatcher {
    batch_size: usize,
    store: Arc<dyn TaskStore>,
    pool: WorkerPool,
    retry: RetryPolicy,
}

impl BatchDispatcher {
    /// Create a dispatcher.
    pub fn new(
        batch_size: usize,
        store: Arc<dyn TaskStore>,
        pool: WorkerPool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            batch_size,
            store,
            pool,
            retry,
        }
    }

    /// Run one publish cycle.
    ///
    /// A store failure while listing aborts the cycle before any task
    /// state changes; the scheduler retries on its next tick. Every
    /// per-task error after selection is resolved locally and logged.
    pub async fn dispatch_cycle(&self) -> Result<CycleReport, SchedulerError> {
        let now = Utc::now();
        let mut tasks = self
            .store
            .list_eligible(&ELIGIBLE_STATUSES, self.batch_size)
            .await?;

        // The store orders and filters, but eligibility is re-checked
        // here so a lagging store cannot dispatch a not-yet-due retry.
        tasks.retain(|t| t.is_eligible(now));
        tasks.sort_by(|a, b| {
            a.eligible_since()
                .cmp(&b.eligible_since())
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks.truncate(self.batch_size);

        if tasks.is_empty() {
            debug!("no eligible tasks, skipping cycle");
            return Ok(CycleReport::default());
        }

        // Mark selected tasks dispatched before submission, so a crash
        // mid-cycle cannot silently re-select them without an explicit
        // recovery pass by the task store.
        let mut dispatched = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            match self
                .store
                .update_status(&task.id, TaskStatus::Dispatched, now)
                .await
            {
                Ok(()) => {
                    task.status = TaskStatus::Dispatched;
                    dispatched.push(task);
                }
                Err(e) => {
                    warn!(task = %task.id, error = %e, "failed to mark task dispatched, dropping from cycle");
                }
            }
        }

        let mut report = CycleReport {
            selected: dispatched.len(),
            ..Default::default()
        };
        info!(selected = report.selected, "dispatching publish batch");

        let outcomes = self.pool.submit_batch(dispatched).await;
        for (task, outcome) in outcomes {
            self.resolve(task, outcome, &mut report).await;
        }

        Ok(report)
    }

    /// Persist the transition implied by one publish outcome.
    async fn resolve(&self, task: Task, outcome: PublishOutcome, report: &mut CycleReport) {
        let now = Utc::now();
        let attempts = task.attempt_count + 1;

        if let Err(e) = self.store.record_attempt(&task.id, attempts, now).await {
            warn!(task = %task.id, error = %e, "failed to record publish attempt");
        }

        match self.retry.classify(&outcome, attempts) {
            RetryAction::Success => {
                if let Err(e) = self
                    .store
                    .update_status(&task.id, TaskStatus::Published, now)
                    .await
                {
                    warn!(task = %task.id, error = %e, "failed to mark task published");
                }
                report.published += 1;
                info!(task = %task.id, attempts, "task published");
            }
            RetryAction::RetryAfter(delay) => {
                // Delays beyond chrono's range saturate to the far future
                // rather than overflowing the timestamp arithmetic.
                let due = ChronoDuration::from_std(delay)
                    .ok()
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
                if let Err(e) = self
                    .store
                    .update_status(&task.id, TaskStatus::Retrying, due)
                    .await
                {
                    warn!(task = %task.id, error = %e, "failed to mark task retrying");
                }
                report.retrying += 1;
                info!(
                    task = %task.id,
                    attempts,
                    outcome = ?outcome,
                    retry_due = %due,
                    "task scheduled for retry"
                );
            }
            RetryAction::Fail => {
                if let Err(e) = self
                    .store
                    .update_status(&task.id, TaskStatus::Failed, now)
                    .await
                {
                    warn!(task = %task.id, error = %e, "failed to mark task failed");
                }
                report.failed += 1;
                warn!(task = %task.id, attempts, outcome = ?outcome, "task failed");
            }
        }
    }
}
