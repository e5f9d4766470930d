//! The publish scheduler control loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    BatchDispatcher, CycleReport, MinIntervalGate, PublishClient, RateWindow, RetryPolicy,
    ScheduleConfig, SchedulerError, TaskStore, WorkerPool,
};

/// Top-level control loop.
///
/// Wakes every `check_interval_secs`, starts a publish cycle when the
/// configured cadence has elapsed (start-to-start gating), and persists
/// the resulting task transitions through the dispatcher. On shutdown
/// the in-flight cycle is allowed to finish; no new cycle is started.
pub struct PublishScheduler {
    config: ScheduleConfig,
    dispatcher: BatchDispatcher,
    last_cycle_started: Mutex<Option<Instant>>,
}

impl PublishScheduler {
    /// Create a scheduler from validated configuration.
    ///
    /// Fails fast on configuration errors; the loop never starts with
    /// an invalid config.
    pub fn new(
        config: ScheduleConfig,
        store: Arc<dyn TaskStore>,
        client: Arc<dyn PublishClient>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        let rate = Arc::new(RateWindow::new(config.max_requests_per_minute));
        let gate = Arc::new(MinIntervalGate::new(config.min_publish_interval()));
        let pool = WorkerPool::new(&config, rate, gate, Arc::clone(&store), client);
        let retry = RetryPolicy::from_config(&config);
        let dispatcher = BatchDispatcher::new(config.batch_size, store, pool, retry);

        Ok(Self {
            config,
            dispatcher,
            last_cycle_started: Mutex::new(None),
        })
    }

    /// Run the control loop until a shutdown signal arrives.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_hours = self.config.interval_hours,
            batch_size = self.config.batch_size,
            max_workers = self.config.max_workers,
            max_requests_per_minute = self.config.max_requests_per_minute,
            "publish scheduler starting"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            if let Err(e) = self.tick().await {
                warn!(error = %e, "publish cycle failed, will retry next tick");
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = tokio::time::sleep(self.config.check_interval()) => {}
            }
        }

        info!("publish scheduler shut down gracefully");
    }

    /// Run one cycle immediately, bypassing the cadence check.
    ///
    /// Used by the `run-once` command. Consumes the cycle interval on
    /// success, like a loop-started cycle.
    pub async fn run_cycle_now(&self) -> Result<CycleReport, SchedulerError> {
        let started = Instant::now();
        let report = self.dispatcher.dispatch_cycle().await?;
        *self.last_cycle_started.lock().await = Some(started);
        Ok(report)
    }

    /// One loop iteration: check the cadence and dispatch when due.
    async fn tick(&self) -> Result<(), SchedulerError> {
        let now = Instant::now();
        let previous = {
            let mut last = self.last_cycle_started.lock().await;
            match *last {
                Some(prev) if now.duration_since(prev) < self.config.cycle_interval() => {
                    debug!(
                        since_last_secs = now.duration_since(prev).as_secs(),
                        "cycle not due yet"
                    );
                    return Ok(());
                }
                prev => {
                    // Claim the cycle start before dispatching so a slow
                    // cycle cannot overlap the next cadence check.
                    *last = Some(now);
                    prev
                }
            }
        };

        match self.dispatcher.dispatch_cycle().await {
            Ok(report) => {
                if !report.is_empty() {
                    info!(
                        selected = report.selected,
                        published = report.published,
                        retrying = report.retrying,
                        failed = report.failed,
                        "publish cycle complete"
                    );
                }
                Ok(())
            }
            Err(e) => {
                // An infrastructure failure must not consume the cycle
                // interval; restore the previous start so the next tick
                // retries the whole cycle.
                *self.last_cycle_started.lock().await = previous;
                Err(e)
            }
        }
    }

    /// Time until the next cycle may start. `None` when due now.
    pub async fn next_cycle_in(&self) -> Option<Duration> {
        let last = self.last_cycle_started.lock().await;
        let prev = (*last)?;
        let elapsed = Instant::now().duration_since(prev);
        let interval = self.config.cycle_interval();
        if elapsed >= interval {
            None
        } else {
            Some(interval - elapsed)
        }
    }
}
