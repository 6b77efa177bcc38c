//! Runtime configuration for the access code service.

use std::str::FromStr;
use std::time::Duration;

/// Bounded retry on optimistic concurrency conflicts.
///
/// Attempt `n` (1-based) that loses the race waits
/// `initial_backoff * 2^(n-1)`, capped at `max_backoff`, before reloading
/// the aggregate and re-running the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after attempt `attempt` lost the race.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(200),
        }
    }
}

/// Configuration for [`AccessCodesService`](crate::AccessCodesService).
#[derive(Debug, Clone, Default)]
pub struct AccessCodesConfig {
    pub retry: RetryPolicy,

    /// Upper bound on a single event store call. `None` waits forever.
    pub store_timeout: Option<Duration>,
}

impl AccessCodesConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `ACCESS_CODES_MAX_ATTEMPTS` | 5 |
    /// | `ACCESS_CODES_INITIAL_BACKOFF_MS` | 5 |
    /// | `ACCESS_CODES_MAX_BACKOFF_MS` | 200 |
    /// | `ACCESS_CODES_STORE_TIMEOUT_MS` | unset |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|v| u64::from_str(v.trim()).ok());
        let defaults = RetryPolicy::default();

        let max_attempts = parse("ACCESS_CODES_MAX_ATTEMPTS")
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_attempts);

        Self {
            retry: RetryPolicy {
                max_attempts,
                initial_backoff: parse("ACCESS_CODES_INITIAL_BACKOFF_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.initial_backoff),
                max_backoff: parse("ACCESS_CODES_MAX_BACKOFF_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_backoff),
            },
            store_timeout: parse("ACCESS_CODES_STORE_TIMEOUT_MS").map(Duration::from_millis),
        }
    }
}
