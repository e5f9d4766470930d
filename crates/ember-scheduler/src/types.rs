//! Core task and outcome types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A content item queued for publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned by the task store. Immutable.
    pub id: String,
    /// Current lifecycle status. Mutated only by the scheduler core.
    pub status: TaskStatus,
    /// Content to publish. Opaque to the scheduler.
    pub payload: serde_json::Value,
    /// Publish attempts made so far.
    pub attempt_count: u32,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the last publish attempt started.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the task was published.
    pub published_at: Option<DateTime<Utc>>,
    /// Earliest time a retrying task may be dispatched again.
    pub retry_due_at: Option<DateTime<Utc>>,
}

/// Lifecycle status of a task.
///
/// `Published` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up by a cycle.
    #[default]
    Pending,
    /// Selected for the current cycle, not yet submitted.
    Dispatched,
    /// A worker is issuing the publish call.
    Publishing,
    /// Published successfully.
    Published,
    /// A transient failure was observed; eligible again at `retry_due_at`.
    Retrying,
    /// Exhausted retries or hit a permanent error.
    Failed,
}

impl Task {
    /// Create a new pending task.
    pub fn new(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            payload,
            attempt_count: 0,
            created_at: Utc::now(),
            last_attempt_at: None,
            published_at: None,
            retry_due_at: None,
        }
    }

    /// Check whether this task may be dispatched at `now`.
    ///
    /// Pending tasks are always eligible; retrying tasks become eligible
    /// once their due time has elapsed.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            TaskStatus::Pending => true,
            TaskStatus::Retrying => self.retry_due_at.is_none_or(|due| due <= now),
            _ => false,
        }
    }

    /// The instant since which this task has been waiting.
    ///
    /// Used for oldest-eligible-first ordering: a retrying task queues
    /// behind its due time, a pending task behind its creation time.
    pub fn eligible_since(&self) -> DateTime<Utc> {
        match self.status {
            TaskStatus::Retrying => self.retry_due_at.unwrap_or(self.created_at),
            _ => self.created_at,
        }
    }
}

/// Result of a single outbound publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The platform accepted the item.
    Success,
    /// The platform rejected the call for quota reasons.
    RateLimited {
        /// Platform-provided wait hint, if any (e.g. a Retry-After header).
        retry_after: Option<Duration>,
    },
    /// The call exceeded its deadline or failed in transit.
    Timeout,
    /// The platform rejected the call in a way that will not heal
    /// (malformed payload, revoked credential).
    Permanent {
        /// Human-readable rejection reason.
        reason: String,
    },
}

/// Counts from one dispatch cycle, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Tasks selected for the cycle.
    pub selected: usize,
    /// Tasks published successfully.
    pub published: usize,
    /// Tasks scheduled for a later retry.
    pub retrying: usize,
    /// Tasks marked failed.
    pub failed: usize,
}

impl CycleReport {
    /// True if the cycle selected no tasks.
    pub fn is_empty(&self) -> bool {
        self.selected == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn task(id: &str) -> Task {
        Task::new(id, serde_json::json!({"text": "hello"}))
    }

    #[test]
    fn new_task_is_pending_and_eligible() {
        let t = task("a");
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.attempt_count, 0);
        assert!(t.is_eligible(Utc::now()));
    }

    #[test]
    fn retrying_task_respects_due_time() {
        let now = Utc::now();
        let mut t = task("a");
        t.status = TaskStatus::Retrying;

        t.retry_due_at = Some(now + ChronoDuration::minutes(5));
        assert!(!t.is_eligible(now));

        t.retry_due_at = Some(now - ChronoDuration::seconds(1));
        assert!(t.is_eligible(now));
    }

    #[test]
    fn terminal_and_in_flight_statuses_are_not_eligible() {
        let now = Utc::now();
        for status in [
            TaskStatus::Dispatched,
            TaskStatus::Publishing,
            TaskStatus::Published,
            TaskStatus::Failed,
        ] {
            let mut t = task("a");
            t.status = status;
            assert!(!t.is_eligible(now), "{status:?} should not be eligible");
        }
    }

    #[test]
    fn eligible_since_prefers_retry_due_time() {
        let mut t = task("a");
        let due = Utc::now() + ChronoDuration::minutes(10);
        t.status = TaskStatus::Retrying;
        t.retry_due_at = Some(due);
        assert_eq!(t.eligible_since(), due);

        t.status = TaskStatus::Pending;
        assert_eq!(t.eligible_since(), t.created_at);
    }

    #[test]
    fn task_roundtrips_through_json() {
        let t = task("roundtrip");
        let json = serde_json::to_string(&t).unwrap();
        let decoded: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, t.id);
        assert_eq!(decoded.status, TaskStatus::Pending);
        assert_eq!(decoded.payload, t.payload);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Retrying).unwrap(),
            "\"retrying\""
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"published\"").unwrap(),
            TaskStatus::Published
        );
    }

    #[test]
    fn empty_report() {
        assert!(CycleReport::default().is_empty());
        let report = CycleReport {
            selected: 1,
            ..Default::default()
        };
        assert!(!report.is_empty());
    }
}
