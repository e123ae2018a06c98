//! # Rank scout
//!
//! Finds the last occupied rank of every tracked hiscore leaderboard while
//! issuing as few rate-limited page fetches as possible, and remembers each
//! boundary so the next run can start from it.
//!
//! The pieces:
//!
//! - [`locator::BoundaryLocator`] searches one metric through the
//!   [`rate_limiter::RateLimiter`] and [`retry::RetryPolicy`]
//! - [`checkpoint::CheckpointStore`] persists the boundaries between runs
//! - [`orchestrator::RunOrchestrator`] drives a run over the metric registry
//! - [`publisher::Publisher`] receives the players a run found

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod locator;
pub mod logging;
pub mod orchestrator;
pub mod publisher;
pub mod rate_limiter;
pub mod retry;

pub use error::{Error, Result};
