//! Rate limiting for hiscore fetches.
//!
//! The remote flags clients that hit it too often, so every fetch must be
//! separated from the end of the previous one by a fixed minimum interval.
//! The limiter hands out a [`FetchPermit`] per fetch; dropping the permit
//! (on success, error or early return) stamps the completion time that the
//! next [`RateLimiter::acquire`] waits on. Holding a permit also excludes any
//! other fetch, so at most one request is ever in flight.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::trace;

/// Configuration for a rate limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Minimum time between the end of one fetch and the start of the next.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_min_interval_ms() -> u64 {
    5_000
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl RateLimiterConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            min_interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Fixed-delay rate limiter shared by every fetch of a run.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    /// When the last permit was released; `None` before the first fetch.
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            min_interval: config.min_interval(),
            last_release: Mutex::new(None),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(&RateLimiterConfig { min_interval_ms: 0 })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a fetch may be issued.
    ///
    /// The returned permit must be held for the duration of the fetch.
    pub async fn acquire(&self) -> FetchPermit<'_> {
        let guard = self.last_release.lock().await;

        let mut waited = Duration::ZERO;
        if let Some(released_at) = *guard {
            let ready_at = released_at + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                waited = ready_at - now;
                trace!(wait = ?waited, "rate limited");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        FetchPermit { guard, waited }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

/// Exclusive right to issue one fetch.
///
/// Dropping the permit records the release time for the next caller.
#[derive(Debug)]
pub struct FetchPermit<'a> {
    guard: MutexGuard<'a, Option<Instant>>,
    waited: Duration,
}

impl FetchPermit<'_> {
    /// Time spent waiting for this permit.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl Drop for FetchPermit<'_> {
    fn drop(&mut self) {
        *self.guard = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_does_not_wait() {
        let limiter = RateLimiter::new(&RateLimiterConfig::with_interval(Duration::from_secs(5)));
        let permit = limiter.acquire().await;
        assert_eq!(permit.waited(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_counts_from_release() {
        let limiter = RateLimiter::new(&RateLimiterConfig::with_interval(Duration::from_secs(5)));

        {
            let _permit = limiter.acquire().await;
            // A slow fetch.
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        let start = Instant::now();
        let permit = limiter.acquire().await;
        assert_eq!(permit.waited(), Duration::from_secs(5));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_wait_after_idle() {
        let limiter = RateLimiter::new(&RateLimiterConfig::with_interval(Duration::from_secs(5)));
        drop(limiter.acquire().await);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let permit = limiter.acquire().await;
        assert_eq!(permit.waited(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_released_on_error_path() {
        async fn failing_fetch(limiter: &RateLimiter) -> Result<(), &'static str> {
            let _permit = limiter.acquire().await;
            Err("boom")
        }

        let limiter = RateLimiter::new(&RateLimiterConfig::with_interval(Duration::from_secs(1)));
        assert!(failing_fetch(&limiter).await.is_err());

        let permit = limiter.acquire().await;
        assert_eq!(permit.waited(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        for _ in 0..3 {
            assert_eq!(limiter.acquire().await.waited(), Duration::ZERO);
        }
    }

    #[test]
    fn test_oversized_interval_saturates() {
        let config = RateLimiterConfig::with_interval(Duration::MAX);
        assert_eq!(config.min_interval_ms, u64::MAX);

        let config = RateLimiterConfig::with_interval(Duration::from_millis(1_500));
        assert_eq!(config.min_interval(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_config_defaults() {
        let config: RateLimiterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.min_interval(), Duration::from_secs(5));
    }
}
