//! Bounded worker pool for publish calls.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::{
    MinIntervalGate, PublishClient, PublishOutcome, RateWindow, ScheduleConfig, Task, TaskStatus,
    TaskStore,
};

/// Fixed-size pool of concurrent publish executors.
///
/// Each worker, per task: acquires the minimum-interval gate, claims a
/// rate-window slot (which records the attempt), then issues exactly one
/// publish call under the per-call deadline. Retries are never performed
/// here; they are re-enqueued by the dispatcher.
pub struct WorkerPool {
    max_workers: usize,
    api_timeout: Duration,
    rate: Arc<RateWindow>,
    gate: Arc<MinIntervalGate>,
    store: Arc<dyn TaskStore>,
    client: Arc<dyn PublishClient>,
}

impl WorkerPool {
    /// Create a pool. Pool size is fixed for the process lifetime.
    pub fn new(
        config: &ScheduleConfig,
        rate: Arc<RateWindow>,
        gate: Arc<MinIntervalGate>,
        store: Arc<dyn TaskStore>,
        client: Arc<dyn PublishClient>,
    ) -> Self {
        Self {
            max_workers: config.max_workers,
            api_timeout: config.api_timeout(),
            rate,
            gate,
            store,
            client,
        }
    }

    /// Publish a batch of tasks, one outbound attempt each.
    ///
    /// Blocks until every task in the batch has an outcome. Completion
    /// order across workers is not guaranteed.
    pub async fn submit_batch(&self, tasks: Vec<Task>) -> Vec<(Task, PublishOutcome)> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let count = tasks.len();
        let (work_tx, work_rx) = mpsc::channel::<Task>(count);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<(Task, PublishOutcome)>(count);

        let workers = self.max_workers.min(count);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let rate = Arc::clone(&self.rate);
            let gate = Arc::clone(&self.gate);
            let store = Arc::clone(&self.store);
            let client = Arc::clone(&self.client);
            let api_timeout = self.api_timeout;

            handles.push(tokio::spawn(async move {
                loop {
                    let task = { work_rx.lock().await.recv().await };
                    let Some(task) = task else {
                        // Channel drained, batch is done.
                        break;
                    };

                    let outcome =
                        Self::attempt(&task, &rate, &gate, &store, &client, api_timeout, worker_id)
                            .await;
                    if result_tx.send((task, outcome)).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        for task in tasks {
            // Capacity equals the batch size, so feeding cannot block.
            if work_tx.send(task).await.is_err() {
                break;
            }
        }
        drop(work_tx);

        let mut outcomes = Vec::with_capacity(count);
        while let Some(result) = result_rx.recv().await {
            outcomes.push(result);
        }
        for handle in handles {
            let _ = handle.await;
        }
        outcomes
    }

    /// Run one gated publish attempt for a task.
    async fn attempt(
        task: &Task,
        rate: &RateWindow,
        gate: &MinIntervalGate,
        store: &Arc<dyn TaskStore>,
        client: &Arc<dyn PublishClient>,
        api_timeout: Duration,
        worker_id: usize,
    ) -> PublishOutcome {
        let waited = gate.acquire().await;
        rate.admit().await;

        // Best effort: a write failure here must not leak the worker's
        // rate slot or abort the batch.
        if let Err(e) = store
            .update_status(&task.id, TaskStatus::Publishing, Utc::now())
            .await
        {
            warn!(task = %task.id, error = %e, "failed to mark task publishing");
        }

        debug!(
            worker_id,
            task = %task.id,
            gate_wait_ms = waited.as_millis() as u64,
            "issuing publish call"
        );

        match tokio::time::timeout(api_timeout, client.publish(&task.payload)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    task = %task.id,
                    timeout_secs = api_timeout.as_secs(),
                    "publish call exceeded deadline"
                );
                PublishOutcome::Timeout
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryTaskStore;
    use async_trait::async_trait;
    use tokio::time::Instant;

    /// Records the instant of every publish call.
    struct RecordingClient {
        calls: Mutex<Vec<Instant>>,
        outcome: PublishOutcome,
    }

    impl RecordingClient {
        fn new(outcome: PublishOutcome) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                outcome,
            }
        }
    }

    #[async_trait]
    impl PublishClient for RecordingClient {
        async fn publish(&self, _payload: &serde_json::Value) -> PublishOutcome {
            self.calls.lock().await.push(Instant::now());
            self.outcome.clone()
        }
    }

    /// Never completes; forces the deadline path.
    struct HangingClient;

    #[async_trait]
    impl PublishClient for HangingClient {
        async fn publish(&self, _payload: &serde_json::Value) -> PublishOutcome {
            std::future::pending().await
        }
    }

    async fn seeded_store(n: usize) -> Arc<MemoryTaskStore> {
        let store = Arc::new(MemoryTaskStore::new());
        for i in 0..n {
            store
                .insert(Task::new(format!("t{i}"), serde_json::json!({ "n": i })))
                .await;
        }
        store
    }

    fn pool_config(workers: usize) -> ScheduleConfig {
        ScheduleConfig {
            max_workers: workers,
            min_publish_interval_secs: 0,
            max_requests_per_minute: 1000,
            api_timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_task_gets_exactly_one_outcome() {
        let config = pool_config(3);
        let store = seeded_store(8).await;
        let client = Arc::new(RecordingClient::new(PublishOutcome::Success));
        let pool = WorkerPool::new(
            &config,
            Arc::new(RateWindow::new(config.max_requests_per_minute)),
            Arc::new(MinIntervalGate::new(config.min_publish_interval())),
            store.clone(),
            client.clone(),
        );

        let tasks = store.all().await;
        let outcomes = pool.submit_batch(tasks).await;
        assert_eq!(outcomes.len(), 8);
        assert_eq!(client.calls.lock().await.len(), 8);
        assert!(outcomes.iter().all(|(_, o)| *o == PublishOutcome::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_is_a_no_op() {
        let config = pool_config(2);
        let store = seeded_store(0).await;
        let client = Arc::new(RecordingClient::new(PublishOutcome::Success));
        let pool = WorkerPool::new(
            &config,
            Arc::new(RateWindow::new(config.max_requests_per_minute)),
            Arc::new(MinIntervalGate::new(config.min_publish_interval())),
            store,
            client.clone(),
        );
        assert!(pool.submit_batch(Vec::new()).await.is_empty());
        assert!(client.calls.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_overrun_yields_timeout() {
        let config = pool_config(1);
        let store = seeded_store(1).await;
        let pool = WorkerPool::new(
            &config,
            Arc::new(RateWindow::new(config.max_requests_per_minute)),
            Arc::new(MinIntervalGate::new(config.min_publish_interval())),
            store.clone(),
            Arc::new(HangingClient),
        );

        let outcomes = pool.submit_batch(store.all().await).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].1, PublishOutcome::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn tasks_pass_through_publishing_status() {
        let config = pool_config(1);
        let store = seeded_store(1).await;
        let client = Arc::new(RecordingClient::new(PublishOutcome::Success));
        let pool = WorkerPool::new(
            &config,
            Arc::new(RateWindow::new(config.max_requests_per_minute)),
            Arc::new(MinIntervalGate::new(config.min_publish_interval())),
            store.clone(),
            client,
        );

        pool.submit_batch(store.all().await).await;
        // The pool's last write for the task is the publishing mark; the
        // dispatcher owns the terminal transition.
        assert_eq!(
            store.get("t0").await.unwrap().status,
            TaskStatus::Publishing
        );
    }

    #[tokio::test(start_paused = true)]
    async fn call_starts_respect_the_minimum_interval() {
        let config = ScheduleConfig {
            max_workers: 5,
            min_publish_interval_secs: 3600,
            max_requests_per_minute: 1000,
            ..Default::default()
        };
        let store = seeded_store(2).await;
        let client = Arc::new(RecordingClient::new(PublishOutcome::Success));
        let pool = WorkerPool::new(
            &config,
            Arc::new(RateWindow::new(config.max_requests_per_minute)),
            Arc::new(MinIntervalGate::new(config.min_publish_interval())),
            store.clone(),
            client.clone(),
        );

        pool.submit_batch(store.all().await).await;

        let mut calls = client.calls.lock().await.clone();
        calls.sort();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_secs(3600));
    }
}
