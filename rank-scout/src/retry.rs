//! Re-fetching pages after transient failures.
//!
//! Every retry also goes back through the rate limiter, so the backoff here
//! is extra spacing on top of the fixed fetch interval.

use std::time::Duration;

use hiscores_client::FetchError;
use rand::RngExt;
use serde::{Deserialize, Serialize};

/// How often and after how long a failed page fetch is repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts per page after the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before the first retry; doubles on each further retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Cap on a single backoff, jitter included.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Spread backoffs by up to half the base backoff.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    5_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Give up on the first failure.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Retry back to back; only the rate limiter spaces the attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_ms: 0,
            max_backoff_ms: 0,
            jitter: false,
        }
    }

    /// Backoff before repeating a fetch that failed on `attempt` (0-indexed),
    /// or `None` when the fetch should not be repeated.
    pub fn next_delay(&self, attempt: u32, error: &FetchError) -> Option<Duration> {
        if attempt >= self.max_retries || !error.is_retryable() {
            return None;
        }
        Some(self.backoff(attempt))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let capped = self.backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);

        let jitter_limit = (self.backoff_ms / 2).min(self.max_backoff_ms - capped);
        if !self.jitter || jitter_limit == 0 {
            return Duration::from_millis(capped);
        }
        Duration::from_millis(capped + rand::rng().random_range(0..=jitter_limit))
    }
}
