//! # Hiscores client
//!
//! Collaborators for the rank scout: the static metric registry, the typed
//! leaderboard entry model and the [`PageFetcher`] capability used to read
//! one page of a remote, paginated hiscore table.
//!
//! ## Features
//!
//! - [`MetricRegistry`] built once from a static table, keyed by the seasonal flag
//! - [`Entry`] rows carrying a tagged [`Score`] chosen by the metric kind
//! - [`HttpPageFetcher`] speaking to the remote over `reqwest`
//! - [`SyntheticBoard`] an in-memory leaderboard for dry runs and tests

pub mod entry;
pub mod error;
pub mod fetcher;
pub mod metric;
pub mod synthetic;

pub use entry::{Entry, Score};
pub use error::FetchError;
pub use fetcher::{FetchOutcome, FetcherConfig, HttpPageFetcher, PageFetcher, RawRow};
pub use metric::{IndexMode, Metric, MetricKind, MetricRegistry};
pub use synthetic::SyntheticBoard;
