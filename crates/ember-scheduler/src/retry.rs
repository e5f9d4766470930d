//! Retry classification for publish outcomes.

use std::time::Duration;

use crate::{PublishOutcome, ScheduleConfig};

/// What to do with a task after a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Mark the task published.
    Success,
    /// Re-enqueue the task, due again after this delay.
    RetryAfter(Duration),
    /// Mark the task failed. No further attempts.
    Fail,
}

/// Classifies publish outcomes into retry actions.
///
/// Retries are modeled as explicit state (the `retrying` status plus a
/// due time) consumed by a later dispatch cycle, never as an internal
/// loop, so they survive a crash and cannot grow the call stack.
pub struct RetryPolicy {
    retry_on_rate_limit: bool,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl RetryPolicy {
    /// Build the policy from scheduler configuration.
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self {
            retry_on_rate_limit: config.retry_on_rate_limit,
            max_attempts: config.max_attempts,
            base: Duration::from_secs(config.retry_backoff_base_secs),
            cap: Duration::from_secs(config.retry_backoff_cap_secs),
        }
    }

    /// Classify the outcome of attempt number `attempt_count` (1-based).
    pub fn classify(&self, outcome: &PublishOutcome, attempt_count: u32) -> RetryAction {
        let action = match outcome {
            PublishOutcome::Success => return RetryAction::Success,
            PublishOutcome::Permanent { .. } => return RetryAction::Fail,
            PublishOutcome::Timeout => RetryAction::RetryAfter(self.backoff(attempt_count)),
            PublishOutcome::RateLimited { retry_after } => {
                if !self.retry_on_rate_limit {
                    return RetryAction::Fail;
                }
                // Honor the platform's wait hint when it gives one,
                // otherwise fall back to the timeout backoff curve.
                let delay = retry_after
                    .map(|hint| hint.min(self.cap))
                    .unwrap_or_else(|| self.backoff(attempt_count));
                RetryAction::RetryAfter(delay)
            }
        };

        if attempt_count >= self.max_attempts {
            RetryAction::Fail
        } else {
            action
        }
    }

    /// Capped exponential backoff: base doubled per prior attempt.
    fn backoff(&self, attempt_count: u32) -> Duration {
        let shift = attempt_count.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << shift).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn policy(retry_on_rate_limit: bool) -> RetryPolicy {
        RetryPolicy::from_config(&ScheduleConfig {
            retry_on_rate_limit,
            max_attempts: 5,
            retry_backoff_base_secs: 60,
            retry_backoff_cap_secs: 3600,
            ..Default::default()
        })
    }

    #[test]
    fn success_is_success_even_past_max_attempts() {
        let action = policy(true).classify(&PublishOutcome::Success, 99);
        assert_eq!(action, RetryAction::Success);
    }

    #[test]
    fn permanent_error_fails_immediately() {
        let outcome = PublishOutcome::Permanent {
            reason: "malformed payload".to_string(),
        };
        assert_eq!(policy(true).classify(&outcome, 1), RetryAction::Fail);
    }

    #[test_case(1, 60; "first attempt uses base")]
    #[test_case(2, 120; "second attempt doubles")]
    #[test_case(4, 480; "fourth attempt is eight times base")]
    fn timeout_backs_off_exponentially(attempt: u32, expected_secs: u64) {
        let action = policy(true).classify(&PublishOutcome::Timeout, attempt);
        assert_eq!(
            action,
            RetryAction::RetryAfter(Duration::from_secs(expected_secs))
        );
    }

    #[test]
    fn rate_limited_honors_platform_hint() {
        let outcome = PublishOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(17)),
        };
        assert_eq!(
            policy(true).classify(&outcome, 1),
            RetryAction::RetryAfter(Duration::from_secs(17))
        );
    }

    #[test]
    fn rate_limited_hint_is_capped() {
        let outcome = PublishOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(999_999)),
        };
        assert_eq!(
            policy(true).classify(&outcome, 1),
            RetryAction::RetryAfter(Duration::from_secs(3600))
        );
    }

    #[test]
    fn rate_limited_without_hint_uses_backoff() {
        let outcome = PublishOutcome::RateLimited { retry_after: None };
        assert_eq!(
            policy(true).classify(&outcome, 2),
            RetryAction::RetryAfter(Duration::from_secs(120))
        );
    }

    #[test]
    fn rate_limit_retry_can_be_disabled() {
        let outcome = PublishOutcome::RateLimited { retry_after: None };
        assert_eq!(policy(false).classify(&outcome, 1), RetryAction::Fail);
    }

    #[test]
    fn retries_exhaust_at_max_attempts() {
        let p = policy(true);
        assert!(matches!(
            p.classify(&PublishOutcome::Timeout, 4),
            RetryAction::RetryAfter(_)
        ));
        assert_eq!(p.classify(&PublishOutcome::Timeout, 5), RetryAction::Fail);
        let rate_limited = PublishOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(1)),
        };
        assert_eq!(p.classify(&rate_limited, 5), RetryAction::Fail);
    }

    proptest! {
        #[test]
        fn backoff_is_bounded_and_non_decreasing(a in 1u32..100, b in 1u32..100) {
            let p = policy(true);
            let delay_a = p.backoff(a);
            let delay_b = p.backoff(b);
            prop_assert!(delay_a >= Duration::from_secs(60));
            prop_assert!(delay_a <= Duration::from_secs(3600));
            if a <= b {
                prop_assert!(delay_a <= delay_b);
            }
        }
    }
}
