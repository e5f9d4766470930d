//! Task store interface and in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{StoreError, Task, TaskStatus};

/// Interface to the external task store.
///
/// The scheduler treats every write as a transactional single-task
/// update; no multi-task atomicity is assumed.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// List tasks whose status is in `statuses`, oldest-eligible first
    /// with a stable tie-break on task id, up to `limit`.
    async fn list_eligible(
        &self,
        statuses: &[TaskStatus],
        limit: usize,
    ) -> Result<Vec<Task>, StoreError>;

    /// Persist a status transition.
    ///
    /// `at` is the effective timestamp for the transition: the publish
    /// time for `Published`, the retry due time for `Retrying`, and the
    /// transition time otherwise.
    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Persist the attempt counter after a publish attempt, so retry
    /// exhaustion survives a crash.
    async fn record_attempt(
        &self,
        id: &str,
        attempt_count: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// In-memory task store.
///
/// Backs the test suites; production runs use the HTTP store in
/// `ember-platform`.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, replacing any task with the same id.
    pub async fn insert(&self, task: Task) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    /// Fetch a task by id.
    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Snapshot of every task, in unspecified order.
    pub async fn all(&self) -> Vec<Task> {
        self.tasks.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list_eligible(
        &self,
        statuses: &[TaskStatus],
        limit: usize,
    ) -> Result<Vec<Task>, StoreError> {
        let now = Utc::now();
        let tasks = self.tasks.read().await;
        let mut eligible: Vec<Task> = tasks
            .values()
            .filter(|t| statuses.contains(&t.status) && t.is_eligible(now))
            .cloned()
            .collect();
        eligible.sort_by(|a, b| {
            a.eligible_since()
                .cmp(&b.eligible_since())
                .then_with(|| a.id.cmp(&b.id))
        });
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.status = status;
        match status {
            TaskStatus::Published => {
                task.published_at = Some(at);
                task.retry_due_at = None;
            }
            TaskStatus::Retrying => task.retry_due_at = Some(at),
            _ => {}
        }
        Ok(())
    }

    async fn record_attempt(
        &self,
        id: &str,
        attempt_count: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.attempt_count = attempt_count;
        task.last_attempt_at = Some(at);
        Ok(())
    }
}
