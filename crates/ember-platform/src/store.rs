//! Task store backed by the platform's task API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ember_scheduler::{StoreError, Task, TaskStatus, TaskStore};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::error::PlatformError;

#[derive(Serialize)]
struct StatusUpdate {
    status: TaskStatus,
    at: DateTime<Utc>,
}

#[derive(Serialize)]
struct AttemptRecord {
    attempt_count: u32,
    at: DateTime<Utc>,
}

/// [`TaskStore`] implementation over the platform's REST task API.
///
/// The API is the system of record: this type holds no task state of
/// its own. Transport failures and server errors surface as
/// [`StoreError::Unavailable`] so the scheduler can retry the cycle.
pub struct HttpTaskStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpTaskStore {
    /// Create a store client for the task API at `base_url`.
    pub fn new(base_url: &str, token: &str) -> Result<Self, PlatformError> {
        if base_url.is_empty() {
            return Err(PlatformError::Config("base URL must not be empty".into()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn wire_status(status: TaskStatus) -> &'static str {
        match status {
            TaskStatus::Pending => "pending",
            TaskStatus::Dispatched => "dispatched",
            TaskStatus::Publishing => "publishing",
            TaskStatus::Published => "published",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Failed => "failed",
        }
    }

    /// Map a non-success write response onto a store error.
    async fn write_error(id: &str, response: Response) -> StoreError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return StoreError::TaskNotFound(id.to_string());
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            StoreError::Rejected(format!("{status}: {body}"))
        } else {
            StoreError::Unavailable(format!("{status}: {body}"))
        }
    }
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn list_eligible(
        &self,
        statuses: &[TaskStatus],
        limit: usize,
    ) -> Result<Vec<Task>, StoreError> {
        let status_param = statuses
            .iter()
            .map(|s| Self::wire_status(*s))
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/api/v1/tasks/eligible", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("status", status_param.as_str()), ("limit", &limit.to_string())])
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!("{status}: {body}")));
        }

        let tasks: Vec<Task> = response
            .json()
            .await
            .map_err(|e| StoreError::Rejected(format!("malformed task list: {e}")))?;
        debug!(count = tasks.len(), "fetched eligible tasks");
        Ok(tasks)
    }

    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let url = format!("{}/api/v1/tasks/{id}/status", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&StatusUpdate { status, at })
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::write_error(id, response).await)
        }
    }

    async fn record_attempt(
        &self,
        id: &str,
        attempt_count: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let url = format!("{}/api/v1/tasks/{id}/attempt", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&AttemptRecord { attempt_count, at })
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::write_error(id, response).await)
        }
    }
}
