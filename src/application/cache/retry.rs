//! Bounded retry with capped exponential backoff.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Error;
use crate::infrastructure::config::retry::RetryConfig;

/// Retry schedule for cache fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            multiplier: multiplier.max(1.0),
            jitter: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            jitter: config.jitter,
            ..Self::new(
                config.max_retries,
                Duration::from_millis(config.initial_delay_ms),
                Duration::from_millis(config.max_delay_ms),
                config.backoff_multiplier,
            )
        }
    }

    /// Single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Total attempts including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay before retry number `retry`, with up to 20% jitter when enabled.
    fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if !self.jitter {
            return base;
        }
        let jitter_range_ms = u64::try_from(base.as_millis() / 5).unwrap_or(u64::MAX);
        if jitter_range_ms == 0 {
            return base;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=jitter_range_ms);
        (base + Duration::from_millis(jitter_ms)).min(self.max_delay.max(base))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Terminal failure of a fetch after retries were exhausted or skipped.
///
/// Cloneable so a single failure can be delivered to every coalesced caller.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub key: String,
    pub attempts: u32,
    pub source: Arc<Error>,
}

impl FetchFailure {
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::Fetch {
            key: self.key,
            attempts: self.attempts,
            source: self.source,
        }
    }
}

/// Run `fetcher` until it succeeds, fails permanently, or attempts run out.
pub(crate) async fn run_with_retry<K, V, F, Fut>(
    policy: &RetryPolicy,
    key: &K,
    fetcher: F,
) -> Result<V, FetchFailure>
where
    K: fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = crate::error::Result<V>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match fetcher().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(key = %key, attempt, "Fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= max_attempts || !err.is_transient() {
                    warn!(key = %key, attempts = attempt, error = %err, "Fetch failed");
                    return Err(FetchFailure {
                        key: key.to_string(),
                        attempts: attempt,
                        source: Arc::new(err),
                    });
                }
                let delay = policy.delay(attempt);
                warn!(
                    key = %key,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Fetch failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(100),
            Duration::from_millis(500),
            2.0,
        );
        assert_eq!(policy.base_delay(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay(2), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(400));
        assert_eq!(policy.base_delay(4), Duration::from_millis(500));
        assert_eq!(policy.max_attempts(), 6);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::new(3, Duration::from_millis(1000), Duration::from_secs(10), 2.0)
        };
        for _ in 0..50 {
            let delay = policy.delay(1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1200));
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO, 1.0);

        let result = run_with_retry(&policy, &"k", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 4 {
                    Err(Error::Transport(format!("attempt {n}")))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO, 1.0);

        let failure = run_with_retry(&policy, &"set_detail:9", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::not_found("comparison set 9")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(failure.attempts, 1);
        assert!(failure.into_error().is_not_found());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO, 1.0);

        let failure = run_with_retry(&policy, &"k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Transport("reset".into())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(failure.attempts, 3);
    }
}
