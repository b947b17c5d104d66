use std::time::{Duration, Instant};

use crate::config::defaults;
use crate::config::types::RetryConfig;
use crate::windows::types::WindowId;

/// One window awaiting a re-attempt.
#[derive(Debug, Clone)]
pub struct RetryEntry {
    pub window_id: WindowId,
    /// Failed attempts so far; bounded by [`RetryPolicy::max_attempts`].
    pub attempts: u32,
    pub next_attempt_at: Instant,
}

/// Delay computation between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// The same delay before every re-attempt.
    Fixed(Duration),
    /// Doubling delay, capped.
    Exponential { base: Duration, cap: Duration },
}

impl BackoffPolicy {
    /// Delay before re-attempt number `attempts` (1-based).
    pub fn delay(&self, attempts: u32) -> Duration {
        match self {
            BackoffPolicy::Fixed(interval) => *interval,
            BackoffPolicy::Exponential { base, cap } => {
                let doublings = attempts.saturating_sub(1).min(16);
                (*base * 2u32.pow(doublings)).min(*cap)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        let base = Duration::from_millis(
            config
                .interval_ms
                .unwrap_or(defaults::DEFAULT_RETRY_INTERVAL_MS),
        );
        let backoff = if config.exponential {
            BackoffPolicy::Exponential {
                base,
                cap: Duration::from_millis(
                    config
                        .max_interval_ms
                        .unwrap_or(defaults::DEFAULT_MAX_INTERVAL_MS),
                ),
            }
        } else {
            BackoffPolicy::Fixed(base)
        };
        Self {
            max_attempts: config.max_attempts.unwrap_or(defaults::DEFAULT_MAX_ATTEMPTS),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff_is_constant() {
        let backoff = BackoffPolicy::Fixed(Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(500));
        assert_eq!(backoff.delay(7), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let backoff = BackoffPolicy::Exponential {
            base: Duration::from_millis(250),
            cap: Duration::from_millis(1000),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(250));
        assert_eq!(backoff.delay(2), Duration::from_millis(500));
        assert_eq!(backoff.delay(3), Duration::from_millis(1000));
        assert_eq!(backoff.delay(10), Duration::from_millis(1000));
        // Large attempt counts must not overflow.
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, BackoffPolicy::Fixed(Duration::from_millis(500)));
    }

    #[test]
    fn test_policy_from_exponential_config() {
        let config: RetryConfig = toml::from_str(
            r#"
            max_attempts = 3
            interval_ms = 100
            exponential = true
            max_interval_ms = 400
            "#,
        )
        .unwrap();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(
            policy.backoff,
            BackoffPolicy::Exponential {
                base: Duration::from_millis(100),
                cap: Duration::from_millis(400),
            }
        );
    }
}
