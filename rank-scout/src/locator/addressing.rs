//! Addressing strategies.
//!
//! The search itself is the same for every metric; what differs is how one
//! fetched page is judged. [`Addressing`] turns a page into an
//! [`Observation`]: either data is present at the index (with the boundary
//! candidate it implies) or the index is past the end of the leaderboard.

use hiscores_client::{Entry, IndexMode};

use super::SearchConfig;

/// What one fetch revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Data exists at the fetched index.
    Present {
        /// Boundary candidate implied by this page.
        boundary: u64,
        /// Row occupying the candidate position.
        entry: Entry,
        /// The page is unambiguously the tail of the leaderboard.
        tail: bool,
    },
    /// The fetched index is past the end.
    Absent,
}

impl Observation {
    pub fn is_present(&self) -> bool {
        matches!(self, Observation::Present { .. })
    }
}

/// How indices map to pages for one metric.
pub trait Addressing: Send + Sync {
    /// Lowest index worth fetching.
    fn default_low(&self) -> u64;

    /// Highest index ever fetched.
    fn ceiling(&self) -> u64;

    /// Distance between successive fetches when re-expanding from a prior boundary.
    fn skip(&self) -> u64;

    /// Offset of the index checked right after a present, non-tail prior.
    ///
    /// When nothing is there the prior is still the boundary. `None` when a
    /// present prior is always followed by the regular skip.
    fn confirm_step(&self) -> Option<u64> {
        None
    }

    /// Judge the rows fetched at `index`.
    fn observe(&self, index: u64, entries: Vec<Entry>) -> Observation;
}

/// A fetch at index `i` returns up to `page_size` rows starting at rank `i`.
///
/// Any rows mean present; a short page is the tail.
#[derive(Debug, Clone)]
pub struct RankAddressing {
    page_size: usize,
    skip: u64,
    ceiling: u64,
}

impl RankAddressing {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            page_size: config.page_size,
            skip: config.rank_skip,
            ceiling: config.max_rank,
        }
    }
}

impl Addressing for RankAddressing {
    fn default_low(&self) -> u64 {
        1
    }

    fn ceiling(&self) -> u64 {
        self.ceiling
    }

    fn skip(&self) -> u64 {
        self.skip
    }

    fn observe(&self, _index: u64, mut entries: Vec<Entry>) -> Observation {
        let tail = entries.len() < self.page_size;
        match entries.pop() {
            Some(entry) => Observation::Present {
                boundary: entry.rank,
                entry,
                tail,
            },
            None => Observation::Absent,
        }
    }
}

/// A fetch at index `i` returns the `i`-th fixed-size page.
///
/// Past the last page the remote wraps around to the top of the next
/// listing, so a page other than the first whose first row is rank 1 is
/// treated as past the end. This relies on the remote's pagination quirk.
/// Only the last page can be short.
#[derive(Debug, Clone)]
pub struct PageAddressing {
    page_size: usize,
    skip: u64,
    ceiling: u64,
}

impl PageAddressing {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            page_size: config.page_size,
            skip: config.page_skip,
            ceiling: config.max_page,
        }
    }
}

impl Addressing for PageAddressing {
    fn default_low(&self) -> u64 {
        1
    }

    fn ceiling(&self) -> u64 {
        self.ceiling
    }

    fn skip(&self) -> u64 {
        self.skip
    }

    fn confirm_step(&self) -> Option<u64> {
        Some(1)
    }

    fn observe(&self, index: u64, mut entries: Vec<Entry>) -> Observation {
        let wrapped = entries
            .first()
            .is_some_and(|first| first.rank == 1 && index > self.default_low());
        if wrapped {
            return Observation::Absent;
        }

        let tail = entries.len() < self.page_size;
        match entries.pop() {
            Some(entry) => Observation::Present {
                boundary: index,
                entry,
                tail,
            },
            None => Observation::Absent,
        }
    }
}

/// Pick the strategy for a metric's index mode.
pub fn for_mode(mode: IndexMode, config: &SearchConfig) -> Box<dyn Addressing> {
    match mode {
        IndexMode::Rank => Box::new(RankAddressing::new(config)),
        IndexMode::Page => Box::new(PageAddressing::new(config)),
    }
}
