//! Retry policy with exponential backoff, used by federation delivery.
//!
//! Worker pools themselves never redeliver a message; only collaborators
//! that talk to the network retry, within their own processing call.

use std::future::Future;
use std::time::Duration;

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff policy for `attempts` tries starting at `initial_delay`.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            ..Self::default()
        }
    }

    /// Calculate delay after the given failed attempt (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs > self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs)
    }

    /// Check if another attempt is allowed after `attempt` (0-indexed) failed.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Run `op` until it succeeds or attempts are exhausted, returning the last error.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt) => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::debug!(error = %e, attempt, ?delay, "Attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff() {
        let config = RetryConfig::new(5, Duration::from_secs(2));

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(8));
    }

    #[test]
    fn test_max_delay() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(7200),
            multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(7200));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(7200));
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::new(3, Duration::from_millis(1));

        assert!(config.should_retry(0));
        assert!(config.should_retry(1));
        assert!(!config.should_retry(2));
    }

    #[tokio::test]
    async fn test_run_stops_after_success() {
        let config = RetryConfig::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = config
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("boom".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_returns_last_error() {
        let config = RetryConfig::new(2, Duration::from_millis(1));

        let result: Result<(), String> = config
            .run(|attempt| async move { Err(format!("failure {attempt}")) })
            .await;

        assert_eq!(result.unwrap_err(), "failure 1");
    }
}
