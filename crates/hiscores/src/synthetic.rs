//! In-memory leaderboard.
//!
//! Serves deterministic pages for any metric with a configured size, the way
//! the remote does: rank-indexed fetches return up to `page_size` rows from
//! the requested rank, page-indexed fetches past the last page wrap around to
//! the first page of the next listing. Useful for dry runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::entry::Entry;
use crate::error::FetchError;
use crate::fetcher::{FetchOutcome, PageFetcher};
use crate::metric::{IndexMode, Metric, MetricKind};

#[derive(Debug, Default)]
struct BoardState {
    /// Fetches issued so far, in order.
    log: Vec<(String, u64)>,
    /// Remaining transient failures per metric.
    transient_failures: HashMap<String, u32>,
}

/// Deterministic in-memory leaderboard.
#[derive(Debug)]
pub struct SyntheticBoard {
    page_size: usize,
    sizes: HashMap<String, u64>,
    broken: Vec<String>,
    absent_as_not_found: bool,
    shared_names: bool,
    state: Mutex<BoardState>,
}

impl SyntheticBoard {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            sizes: HashMap::new(),
            broken: Vec::new(),
            absent_as_not_found: false,
            shared_names: false,
            state: Mutex::new(BoardState::default()),
        }
    }

    /// Set the number of ranked players on `metric`.
    pub fn with_size(mut self, metric: impl Into<String>, last_rank: u64) -> Self {
        self.sizes.insert(metric.into(), last_rank);
        self
    }

    /// Every fetch for `metric` fails.
    pub fn with_broken(mut self, metric: impl Into<String>) -> Self {
        self.broken.push(metric.into());
        self
    }

    /// The first `count` fetches for `metric` fail, later ones succeed.
    pub fn with_transient_failures(self, metric: impl Into<String>, count: u32) -> Self {
        self.state
            .lock()
            .transient_failures
            .insert(metric.into(), count);
        self
    }

    /// Report absent rank-indexed pages as [`FetchOutcome::NotFound`] instead of an empty page.
    pub fn with_not_found(mut self) -> Self {
        self.absent_as_not_found = true;
        self
    }

    /// Name rows by rank only, so the same player appears on every metric.
    pub fn with_shared_names(mut self) -> Self {
        self.shared_names = true;
        self
    }

    /// Fetches issued so far as `(metric, index)`.
    pub fn fetch_log(&self) -> Vec<(String, u64)> {
        self.state.lock().log.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().log.len()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    fn size_of(&self, metric: &Metric) -> u64 {
        self.sizes.get(metric.name()).copied().unwrap_or(0)
    }

    fn rows(&self, metric: &Metric, first: u64, last: u64) -> Vec<Entry> {
        (first..=last)
            .map(|rank| {
                let name = if self.shared_names {
                    format!("player #{}", rank)
                } else {
                    format!("{} #{}", metric.name(), rank)
                };
                // Scores fall as rank rises.
                let value = 1_000_000_000u64.saturating_sub(rank);
                match metric.kind() {
                    MetricKind::Skill => Entry::skill(name, rank, 99, value),
                    MetricKind::Activity => Entry::activity(name, rank, value),
                }
            })
            .collect()
    }

    fn serve_rank(&self, metric: &Metric, rank: u64) -> FetchOutcome {
        let size = self.size_of(metric);
        if rank == 0 || rank > size {
            return if self.absent_as_not_found {
                FetchOutcome::NotFound
            } else {
                FetchOutcome::Page(Vec::new())
            };
        }
        let last = size.min(rank + self.page_size as u64 - 1);
        FetchOutcome::Page(self.rows(metric, rank, last))
    }

    fn serve_page(&self, metric: &Metric, page: u64) -> FetchOutcome {
        let size = self.size_of(metric);
        let page_size = self.page_size as u64;
        let pages = size.div_ceil(page_size);

        if page == 0 {
            return FetchOutcome::NotFound;
        }
        if page > pages {
            // The remote reuses page space: past the end it serves the top of the next listing.
            return FetchOutcome::Page(self.rows(metric, 1, page_size));
        }
        let first = (page - 1) * page_size + 1;
        let last = size.min(page * page_size);
        FetchOutcome::Page(self.rows(metric, first, last))
    }
}

#[async_trait]
impl PageFetcher for SyntheticBoard {
    async fn fetch(&self, metric: &Metric, index: u64) -> Result<FetchOutcome, FetchError> {
        {
            let mut state = self.state.lock();
            state.log.push((metric.name().to_string(), index));

            if let Some(remaining) = state.transient_failures.get_mut(metric.name()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Other(format!(
                        "transient failure for {} at {}",
                        metric, index
                    )));
                }
            }
        }

        if self.broken.iter().any(|name| name == metric.name()) {
            return Err(FetchError::Status {
                status: 503,
                url: format!("synthetic://{}/{}", metric, index),
            });
        }

        Ok(match metric.index_mode() {
            IndexMode::Rank => self.serve_rank(metric, index),
            IndexMode::Page => self.serve_page(metric, index),
        })
    }
}
