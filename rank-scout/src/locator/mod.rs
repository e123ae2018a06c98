//! Boundary locator.
//!
//! Finds the last occupied index of a leaderboard whose size is unknown and
//! which can only be read one rate-limited page at a time. "Data present at
//! index `i`" is monotonic: true up to the boundary, false past it. The
//! search therefore:
//!
//! 1. picks a bracket: the whole index range when nothing is known, or a
//!    tight one found by stepping forward from the previous run's boundary
//!    in fixed `skip` increments until a fetch comes back empty;
//! 2. binary-searches the bracket, stopping early on a page that is
//!    unambiguously the tail.
//!
//! Fetches never leave `[default_low, ceiling]` of the metric's addressing.

mod addressing;

use hiscores_client::{Entry, FetchError, FetchOutcome, Metric, PageFetcher};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;

pub use addressing::{Addressing, Observation, PageAddressing, RankAddressing, for_mode};

/// Search tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Rows per fetch; a fetch returning fewer is the tail.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Step when re-expanding from a prior rank.
    #[serde(default = "default_rank_skip")]
    pub rank_skip: u64,
    /// Step when re-expanding from a prior page.
    #[serde(default = "default_page_skip")]
    pub page_skip: u64,
    /// Absolute rank ceiling of any metric.
    #[serde(default = "default_max_rank")]
    pub max_rank: u64,
    /// Absolute page ceiling of any metric.
    #[serde(default = "default_max_page")]
    pub max_page: u64,
}

fn default_page_size() -> usize {
    25
}

fn default_rank_skip() -> u64 {
    25_000
}

fn default_page_skip() -> u64 {
    1_000
}

fn default_max_rank() -> u64 {
    2_000_000
}

fn default_max_page() -> u64 {
    80_000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            rank_skip: default_rank_skip(),
            page_skip: default_page_skip(),
            max_rank: default_max_rank(),
            max_page: default_max_page(),
        }
    }
}

/// Why one metric's search produced no boundary.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("no boundary for {metric} within [{low}, {high}]")]
    ExhaustedSearchSpace { metric: String, low: u64, high: u64 },

    #[error("fetching {metric} at index {index} failed after {attempts} attempt(s): {source}")]
    FetchFailure {
        metric: String,
        index: u64,
        attempts: u32,
        #[source]
        source: FetchError,
    },
}

impl LocateError {
    pub fn metric(&self) -> &str {
        match self {
            LocateError::ExhaustedSearchSpace { metric, .. } => metric,
            LocateError::FetchFailure { metric, .. } => metric,
        }
    }
}

/// The last occupied position of one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryResult {
    pub metric: String,
    /// Rank (rank-indexed) or page (page-indexed) of the boundary.
    pub index: u64,
    /// Row at the boundary.
    pub entry: Entry,
    /// Fetches the search issued, retries included.
    pub fetches: u32,
}

/// Best boundary candidate seen so far.
#[derive(Debug, Clone)]
struct Candidate {
    boundary: u64,
    entry: Entry,
}

/// Index range still to be searched, plus what is already known inside it.
#[derive(Debug)]
struct Bracket {
    low: u64,
    high: u64,
    best: Option<Candidate>,
}

enum Start {
    Search(Bracket),
    Found(Candidate),
}

/// Locates leaderboard boundaries through a rate-limited fetcher.
pub struct BoundaryLocator<F> {
    fetcher: F,
    limiter: RateLimiter,
    retry: RetryPolicy,
    config: SearchConfig,
}

impl<F: PageFetcher> BoundaryLocator<F> {
    pub fn new(fetcher: F, limiter: RateLimiter, retry: RetryPolicy, config: SearchConfig) -> Self {
        Self {
            fetcher,
            limiter,
            retry,
            config,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Find the boundary of `metric`, reusing `prior` from the previous run when known.
    pub async fn locate(
        &self,
        metric: &Metric,
        prior: Option<u64>,
    ) -> Result<BoundaryResult, LocateError> {
        let addressing = for_mode(metric.index_mode(), &self.config);
        let mut search = Search {
            locator: self,
            metric,
            addressing: addressing.as_ref(),
            fetches: 0,
        };

        let candidate = search.run(prior).await?;
        info!(
            metric = %metric,
            index = candidate.boundary,
            player = %candidate.entry.name,
            fetches = search.fetches,
            "Found boundary"
        );

        Ok(BoundaryResult {
            metric: metric.name().to_string(),
            index: candidate.boundary,
            entry: candidate.entry,
            fetches: search.fetches,
        })
    }

    /// Fetch one page through the rate limiter and retry policy.
    ///
    /// Returns the outcome and the number of attempts it took.
    pub async fn fetch_page(
        &self,
        metric: &Metric,
        index: u64,
    ) -> Result<(FetchOutcome, u32), LocateError> {
        let mut attempt = 0;
        loop {
            let result = {
                let _permit = self.limiter.acquire().await;
                self.fetcher.fetch(metric, index).await
            };

            let e = match result {
                Ok(outcome) => return Ok((outcome, attempt + 1)),
                Err(e) => e,
            };

            let Some(delay) = self.retry.next_delay(attempt, &e) else {
                return Err(LocateError::FetchFailure {
                    metric: metric.name().to_string(),
                    index,
                    attempts: attempt + 1,
                    source: e,
                });
            };

            warn!(
                metric = %metric,
                index,
                error = %e,
                "Fetch failed, retrying in {:?} (attempt {}/{})",
                delay,
                attempt + 1,
                self.retry.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// State of one `locate` call.
struct Search<'a, F> {
    locator: &'a BoundaryLocator<F>,
    metric: &'a Metric,
    addressing: &'a dyn Addressing,
    fetches: u32,
}

impl<F: PageFetcher> Search<'_, F> {
    async fn run(&mut self, prior: Option<u64>) -> Result<Candidate, LocateError> {
        let default_low = self.addressing.default_low();
        let ceiling = self.addressing.ceiling();

        let bracket = match prior {
            Some(prior) if prior >= ceiling => {
                debug!(metric = %self.metric, prior, "Prior boundary at ceiling, checking ceiling only");
                Bracket {
                    low: ceiling,
                    high: ceiling,
                    best: None,
                }
            }
            Some(prior) if prior >= default_low => match self.expand_from(prior).await? {
                Start::Found(candidate) => return Ok(candidate),
                Start::Search(bracket) => bracket,
            },
            _ => Bracket {
                low: default_low,
                high: ceiling,
                best: None,
            },
        };

        let (low, high) = (bracket.low, bracket.high);
        if let Some(candidate) = self.binary_search(bracket).await? {
            return Ok(candidate);
        }

        // Nothing at or above the old boundary: the leaderboard shrank.
        if low > default_low {
            warn!(
                metric = %self.metric,
                low,
                high,
                "No data in bracket, searching below the previous boundary"
            );
            let retry = Bracket {
                low: default_low,
                high: low - 1,
                best: None,
            };
            if let Some(candidate) = self.binary_search(retry).await? {
                return Ok(candidate);
            }
        }

        Err(LocateError::ExhaustedSearchSpace {
            metric: self.metric.name().to_string(),
            low: default_low,
            high,
        })
    }

    /// Build a bracket around the boundary starting from the previous run's one.
    async fn expand_from(&mut self, prior: u64) -> Result<Start, LocateError> {
        let ceiling = self.addressing.ceiling();
        let skip = self.addressing.skip().max(1);

        let mut low = prior;
        let mut best = match self.observe_at(prior).await? {
            Observation::Present {
                boundary,
                entry,
                tail,
            } => {
                let candidate = Candidate { boundary, entry };
                if tail {
                    return Ok(Start::Found(candidate));
                }
                candidate
            }
            Observation::Absent => {
                // Empty bracket; the caller falls back to searching below `prior`.
                return Ok(Start::Search(Bracket {
                    low,
                    high: prior - 1,
                    best: None,
                }));
            }
        };

        if let Some(step) = self.addressing.confirm_step() {
            let index = prior.saturating_add(step).min(ceiling);
            if index > prior {
                match self.observe_at(index).await? {
                    Observation::Absent => return Ok(Start::Found(best)),
                    Observation::Present {
                        boundary,
                        entry,
                        tail,
                    } => {
                        let candidate = Candidate { boundary, entry };
                        if tail || index == ceiling {
                            return Ok(Start::Found(candidate));
                        }
                        low = index;
                        best = candidate;
                    }
                }
            }
        }

        let mut next = low.saturating_add(skip);
        loop {
            let index = next.min(ceiling);
            match self.observe_at(index).await? {
                Observation::Absent => {
                    debug!(metric = %self.metric, low, high = index, "New bounds");
                    return Ok(Start::Search(Bracket {
                        low,
                        high: index,
                        best: Some(best),
                    }));
                }
                Observation::Present {
                    boundary,
                    entry,
                    tail,
                } => {
                    let candidate = Candidate { boundary, entry };
                    if tail || index == ceiling {
                        if !tail {
                            warn!(metric = %self.metric, ceiling, "Data extends to the ceiling");
                        }
                        return Ok(Start::Found(candidate));
                    }
                    low = index;
                    best = candidate;
                    next = index.saturating_add(skip);
                }
            }
        }
    }

    /// Binary search `[low, high]` for the last index with data.
    async fn binary_search(&mut self, bracket: Bracket) -> Result<Option<Candidate>, LocateError> {
        let Bracket {
            mut low,
            mut high,
            mut best,
        } = bracket;

        while low <= high {
            let mid = low + (high - low) / 2;
            match self.observe_at(mid).await? {
                Observation::Present {
                    boundary,
                    entry,
                    tail,
                } => {
                    best = Some(Candidate { boundary, entry });
                    if tail {
                        break;
                    }
                    low = mid + 1;
                }
                Observation::Absent => {
                    if mid == 0 {
                        break;
                    }
                    high = mid - 1;
                }
            }
        }

        Ok(best)
    }

    async fn observe_at(&mut self, index: u64) -> Result<Observation, LocateError> {
        debug_assert!(
            (self.addressing.default_low()..=self.addressing.ceiling()).contains(&index),
            "index {index} outside the search space"
        );

        let result = self.locator.fetch_page(self.metric, index).await;
        let (outcome, attempts) = match result {
            Ok(ok) => ok,
            Err(e) => {
                if let LocateError::FetchFailure { attempts, .. } = &e {
                    self.fetches += attempts;
                }
                return Err(e);
            }
        };
        self.fetches += attempts;

        let observation = self.addressing.observe(index, outcome.into_entries());
        debug!(
            metric = %self.metric,
            index,
            present = observation.is_present(),
            "Observed"
        );
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiscores_client::{IndexMode, SyntheticBoard};

    fn locator(board: SyntheticBoard) -> BoundaryLocator<SyntheticBoard> {
        BoundaryLocator::new(
            board,
            RateLimiter::unlimited(),
            RetryPolicy::no_retry(),
            SearchConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_cold_search_finds_boundary() {
        let metric = Metric::skill("Attack", 1);
        let locator = locator(SyntheticBoard::new(25).with_size("Attack", 1_342));

        let result = locator.locate(&metric, None).await.unwrap();
        assert_eq!(result.index, 1_342);
        assert_eq!(result.entry.rank, 1_342);
        assert_eq!(result.fetches as usize, locator.fetcher().fetch_count());
    }

    #[tokio::test]
    async fn test_prior_short_page_resolves_in_one_fetch() {
        let metric = Metric::skill("Attack", 1);
        let locator = locator(SyntheticBoard::new(25).with_size("Attack", 1_342));

        let result = locator.locate(&metric, Some(1_330)).await.unwrap();
        assert_eq!(result.index, 1_342);
        assert_eq!(result.fetches, 1);
    }

    #[tokio::test]
    async fn test_shrunk_board_falls_back_below_prior() {
        let metric = Metric::skill("Attack", 1);
        let locator = locator(SyntheticBoard::new(25).with_size("Attack", 900));

        let result = locator.locate(&metric, Some(1_300)).await.unwrap();
        assert_eq!(result.index, 900);
    }

    #[tokio::test]
    async fn test_prior_at_ceiling_fetches_ceiling_once() {
        let metric = Metric::skill("Overall", 0);
        let locator = locator(SyntheticBoard::new(25).with_size("Overall", 3_000_000));

        let result = locator.locate(&metric, Some(2_000_000)).await.unwrap();
        assert_eq!(result.fetches, 1);
        assert_eq!(locator.fetcher().fetch_log(), vec![("Overall".to_string(), 2_000_000)]);
        assert_eq!(result.index, 2_000_024);
    }

    #[tokio::test]
    async fn test_expansion_saturates_at_ceiling() {
        let metric = Metric::skill("Overall", 0);
        let locator = locator(SyntheticBoard::new(25).with_size("Overall", 3_000_000));

        let result = locator.locate(&metric, Some(1_990_000)).await.unwrap();
        let log = locator.fetcher().fetch_log();
        assert!(log.iter().all(|(_, index)| *index <= 2_000_000));
        assert_eq!(log.last().map(|(_, index)| *index), Some(2_000_000));
        assert_eq!(result.index, 2_000_024);
    }

    #[tokio::test]
    async fn test_empty_board_is_exhausted() {
        let metric = Metric::activity("Artio", 19, 1);
        let locator = locator(SyntheticBoard::new(25));

        let err = locator.locate(&metric, None).await.unwrap_err();
        assert!(matches!(err, LocateError::ExhaustedSearchSpace { .. }));
        assert_eq!(err.metric(), "Artio");
    }

    #[tokio::test]
    async fn test_page_mode_finds_last_page() {
        let metric = Metric::activity("Zulrah", 74, 1).with_index_mode(IndexMode::Page);
        let locator = locator(SyntheticBoard::new(25).with_size("Zulrah", 123_456));

        let result = locator.locate(&metric, None).await.unwrap();
        assert_eq!(result.index, 4_939);
        assert_eq!(result.entry.rank, 123_456);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let metric = Metric::skill("Attack", 1);
        let locator = BoundaryLocator::new(
            SyntheticBoard::new(25).with_broken("Attack"),
            RateLimiter::unlimited(),
            RetryPolicy::immediate(2),
            SearchConfig::default(),
        );

        match locator.locate(&metric, None).await {
            Err(LocateError::FetchFailure { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected fetch failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct BadUrlFetcher {
            calls: AtomicU32,
        }

        #[async_trait::async_trait]
        impl PageFetcher for BadUrlFetcher {
            async fn fetch(&self, _: &Metric, _: u64) -> Result<FetchOutcome, FetchError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::InvalidUrl("relative URL without a base".to_string()))
            }
        }

        let locator = BoundaryLocator::new(
            BadUrlFetcher {
                calls: AtomicU32::new(0),
            },
            RateLimiter::unlimited(),
            RetryPolicy::immediate(2),
            SearchConfig::default(),
        );

        match locator.locate(&Metric::skill("Attack", 1), None).await {
            Err(LocateError::FetchFailure { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("expected fetch failure, got {:?}", other),
        }
        assert_eq!(locator.fetcher().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let metric = Metric::skill("Attack", 1);
        let locator = BoundaryLocator::new(
            SyntheticBoard::new(25)
                .with_size("Attack", 500)
                .with_transient_failures("Attack", 2),
            RateLimiter::unlimited(),
            RetryPolicy::immediate(2),
            SearchConfig::default(),
        );

        let result = locator.locate(&metric, None).await.unwrap();
        assert_eq!(result.index, 500);
        assert_eq!(result.fetches as usize, locator.fetcher().fetch_count());
    }

    #[tokio::test]
    async fn test_not_found_counts_as_absent() {
        let metric = Metric::skill("Attack", 1);
        let locator = locator(
            SyntheticBoard::new(25)
                .with_size("Attack", 77_777)
                .with_not_found(),
        );

        let result = locator.locate(&metric, Some(50_000)).await.unwrap();
        assert_eq!(result.index, 77_777);
    }

    #[test]
    fn test_search_config_defaults() {
        let config: SearchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SearchConfig::default());
        assert_eq!(config.page_size, 25);
        assert_eq!(config.rank_skip, 25_000);
        assert_eq!(config.max_rank, 2_000_000);
    }
}
