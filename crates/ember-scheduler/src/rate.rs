//! Rolling-window accounting of outbound publish attempts.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Length of the rolling window.
const WINDOW: Duration = Duration::from_secs(60);

/// Answer to "may I send now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// A window slot is free.
    Allowed,
    /// The window is full; a slot frees up at this instant.
    Wait(Instant),
}

/// Tracks outbound request timestamps in a rolling one-minute window.
///
/// Shared across all workers. Every read and write happens under one
/// mutex, so no worker ever observes a partially updated window, and
/// admission stays exact regardless of interleaving.
///
/// Accounting is per *attempt*: a timestamp is recorded for every
/// outbound call issued, whether or not it succeeds.
pub struct RateWindow {
    max_per_minute: u32,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    /// Create a window admitting at most `max_per_minute` attempts.
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    /// Check whether a send is currently allowed.
    ///
    /// Evicts entries older than the window, then compares the retained
    /// count against the cap. When full, the reported instant is the
    /// oldest retained entry plus the window length.
    pub async fn can_send(&self) -> RateDecision {
        let mut sent = self.sent.lock().await;
        Self::evict(&mut sent, Instant::now());
        self.decide(&sent)
    }

    /// Record an outbound attempt at the current instant.
    ///
    /// Called exactly once per attempted call, immediately before the
    /// call is issued.
    pub async fn record_send(&self) {
        let mut sent = self.sent.lock().await;
        sent.push_back(Instant::now());
    }

    /// Block until a window slot is free, then claim it.
    ///
    /// The check and the recording happen under a single lock
    /// acquisition, so two workers can never both claim the last free
    /// slot. Re-checks after every wait because another worker may have
    /// consumed the slot in the meantime.
    pub async fn admit(&self) {
        loop {
            let wait_until = {
                let mut sent = self.sent.lock().await;
                let now = Instant::now();
                Self::evict(&mut sent, now);
                match self.decide(&sent) {
                    RateDecision::Allowed => {
                        sent.push_back(now);
                        return;
                    }
                    RateDecision::Wait(until) => until,
                }
            };

            debug!(
                wait_ms = wait_until.saturating_duration_since(Instant::now()).as_millis() as u64,
                "rate window full, waiting for a slot"
            );
            tokio::time::sleep_until(wait_until).await;
        }
    }

    /// Number of attempts currently retained in the window.
    pub async fn recorded(&self) -> usize {
        let mut sent = self.sent.lock().await;
        Self::evict(&mut sent, Instant::now());
        sent.len()
    }

    fn evict(sent: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = sent.front() {
            if now.duration_since(oldest) >= WINDOW {
                sent.pop_front();
            } else {
                break;
            }
        }
    }

    fn decide(&self, sent: &VecDeque<Instant>) -> RateDecision {
        if (sent.len() as u32) < self.max_per_minute {
            return RateDecision::Allowed;
        }
        match sent.front() {
            Some(&oldest) => RateDecision::Wait(oldest + WINDOW),
            // Unreachable while max_per_minute >= 1, which validation enforces.
            None => RateDecision::Allowed,
        }
    }
}
