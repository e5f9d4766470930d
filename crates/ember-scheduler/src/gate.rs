//! Global minimum spacing between publish call starts.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a hard minimum wall-clock gap between the start times of any
/// two publish calls, independent of the rolling rate window.
///
/// The gate is shared by all workers: a second worker's call start is
/// delayed even when the rate window would allow it. The check and the
/// update of `last_publish` happen atomically under one mutex, so two
/// concurrent callers can never both pass on the same interval.
pub struct MinIntervalGate {
    min_interval: Duration,
    last_publish: Mutex<Option<Instant>>,
}

impl MinIntervalGate {
    /// Create a gate with the given minimum interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_publish: Mutex::new(None),
        }
    }

    /// Block until the minimum interval since the previous acquisition
    /// has elapsed, then claim the slot.
    ///
    /// Returns the total time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        loop {
            let wait_until = {
                let mut last = self.last_publish.lock().await;
                let now = Instant::now();
                match *last {
                    Some(prev) if now.duration_since(prev) < self.min_interval => {
                        prev + self.min_interval
                    }
                    _ => {
                        *last = Some(now);
                        return started.elapsed();
                    }
                }
            };

            debug!(
                wait_ms = wait_until.saturating_duration_since(Instant::now()).as_millis() as u64,
                "waiting on minimum publish interval"
            );
            tokio::time::sleep_until(wait_until).await;
        }
    }
}
