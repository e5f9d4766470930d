//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// Configuration for a scheduler run.
///
/// Constructed once at startup and passed explicitly to every component;
/// immutable for the process lifetime. Reloading requires a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minimum hours between the start of successive publish cycles.
    pub interval_hours: u64,
    /// Maximum tasks pulled per cycle.
    pub batch_size: usize,
    /// Maximum concurrent publish calls.
    pub max_workers: usize,
    /// Polling period of the control loop, in seconds.
    pub check_interval_secs: u64,
    /// Minimum gap between any two individual publish calls, in seconds.
    pub min_publish_interval_secs: u64,
    /// Rolling-window cap on outbound publish calls.
    pub max_requests_per_minute: u32,
    /// Per-call deadline, in seconds.
    pub api_timeout_secs: u64,
    /// Whether a rate-limit rejection is retryable.
    pub retry_on_rate_limit: bool,
    /// Attempts after which a retryable task is marked failed.
    pub max_attempts: u32,
    /// Base delay for exponential retry backoff, in seconds.
    pub retry_backoff_base_secs: u64,
    /// Upper bound on any retry delay, in seconds.
    pub retry_backoff_cap_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            batch_size: 10,
            max_workers: 2,
            check_interval_secs: 60,
            min_publish_interval_secs: 30,
            max_requests_per_minute: 15,
            api_timeout_secs: 30,
            retry_on_rate_limit: true,
            max_attempts: 5,
            retry_backoff_base_secs: 60,
            retry_backoff_cap_secs: 3600,
        }
    }
}

impl ScheduleConfig {
    /// Validate the configuration.
    ///
    /// A configuration error is fatal: the scheduler refuses to start.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_workers == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_requests_per_minute == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.check_interval_secs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "check_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.api_timeout_secs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "api_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry_backoff_cap_secs < self.retry_backoff_base_secs {
            return Err(SchedulerError::InvalidConfig(format!(
                "retry_backoff_cap_secs ({}) must not be below retry_backoff_base_secs ({})",
                self.retry_backoff_cap_secs, self.retry_backoff_base_secs
            )));
        }
        Ok(())
    }

    /// Minimum gap between successive cycle starts.
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(3600))
    }

    /// Control loop polling period.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Minimum gap between individual publish calls.
    pub fn min_publish_interval(&self) -> Duration {
        Duration::from_secs(self.min_publish_interval_secs)
    }

    /// Per-call deadline.
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_config_is_valid() {
        assert!(ScheduleConfig::default().validate().is_ok());
    }

    #[test_case(|c| c.max_workers = 0; "zero workers")]
    #[test_case(|c| c.batch_size = 0; "zero batch size")]
    #[test_case(|c| c.max_requests_per_minute = 0; "zero quota")]
    #[test_case(|c| c.check_interval_secs = 0; "zero check interval")]
    #[test_case(|c| c.api_timeout_secs = 0; "zero api timeout")]
    #[test_case(|c| c.max_attempts = 0; "zero max attempts")]
    #[test_case(|c| c.retry_backoff_cap_secs = 1; "cap below base")]
    fn invalid_config_is_rejected(mutate: fn(&mut ScheduleConfig)) {
        let mut config = ScheduleConfig::default();
        mutate(&mut config);
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_interval_hours_is_allowed() {
        // A cycle on every tick is a valid (if aggressive) configuration.
        let config = ScheduleConfig {
            interval_hours: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle_interval(), Duration::ZERO);
    }

    #[test]
    fn min_interval_may_be_stricter_than_quota() {
        // 15/min allows a call every 4s, but a 60s minimum gap is still
        // valid: the gate simply wins when it is the tighter constraint.
        let config = ScheduleConfig {
            max_requests_per_minute: 15,
            min_publish_interval_secs: 60,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn huge_interval_hours_saturates_instead_of_overflowing() {
        let config = ScheduleConfig {
            interval_hours: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.cycle_interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn duration_helpers() {
        let config = ScheduleConfig {
            interval_hours: 48,
            check_interval_secs: 5,
            min_publish_interval_secs: 7,
            api_timeout_secs: 11,
            ..Default::default()
        };
        assert_eq!(config.cycle_interval(), Duration::from_secs(48 * 3600));
        assert_eq!(config.check_interval(), Duration::from_secs(5));
        assert_eq!(config.min_publish_interval(), Duration::from_secs(7));
        assert_eq!(config.api_timeout(), Duration::from_secs(11));
    }
}
