//! Run orchestration.
//!
//! A run visits the configured metrics strictly one after another and
//! isolates per-metric failures. The checkpoint is written exactly once at
//! the end, before the results reach the publisher. Only checkpoint
//! persistence failures abort a run.

use std::collections::HashSet;
use std::sync::Arc;

use hiscores_client::{Metric, MetricRegistry, PageFetcher};
use tracing::{error, info, warn};

use crate::Result;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::locator::{BoundaryLocator, BoundaryResult, LocateError};
use crate::publisher::{Leader, Publisher};

/// A metric that produced no result.
#[derive(Debug)]
pub struct MetricFailure {
    pub metric: String,
    pub error: LocateError,
}

/// Outcome of a last-rank run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Boundaries found, in metric order.
    pub results: Vec<BoundaryResult>,
    /// Metrics that failed and were skipped.
    pub failures: Vec<MetricFailure>,
    /// Checkpoint as persisted at the end of the run.
    pub checkpoint: Checkpoint,
    /// Whether the publisher accepted the results.
    pub published: bool,
    pub publish_error: Option<String>,
}

impl RunReport {
    pub fn success_count(&self) -> usize {
        self.results.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if every metric was processed successfully.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total fetches issued across all successful searches.
    pub fn total_fetches(&self) -> u64 {
        self.results.iter().map(|r| r.fetches as u64).sum()
    }
}

/// Outcome of a leaders run.
#[derive(Debug, Default)]
pub struct LeadersReport {
    /// Leaders not already seen on an earlier metric.
    pub leaders: Vec<Leader>,
    pub failures: Vec<MetricFailure>,
    pub published: bool,
    pub publish_error: Option<String>,
}

/// Drives the per-metric searches of one run.
pub struct RunOrchestrator<F> {
    locator: BoundaryLocator<F>,
    registry: MetricRegistry,
    store: Arc<dyn CheckpointStore>,
    publisher: Arc<dyn Publisher>,
    metric_limit: Option<usize>,
}

impl<F: PageFetcher> RunOrchestrator<F> {
    pub fn new(
        locator: BoundaryLocator<F>,
        registry: MetricRegistry,
        store: Arc<dyn CheckpointStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            locator,
            registry,
            store,
            publisher,
            metric_limit: None,
        }
    }

    /// Only visit the first `limit` metrics.
    pub fn with_metric_limit(mut self, limit: Option<usize>) -> Self {
        self.metric_limit = limit;
        self
    }

    fn metrics(&self) -> &[Metric] {
        self.registry.limited(self.metric_limit)
    }

    /// Find the last ranked player of every metric.
    pub async fn run_last_ranks(&self) -> Result<RunReport> {
        let metrics = self.metrics();
        info!(metrics = metrics.len(), "Starting last rank run");

        let mut checkpoint = self.store.load().await?;
        let mut report = RunReport::default();

        for metric in metrics {
            let prior = checkpoint.get(metric.name());
            info!(metric = %metric, prior = ?prior, "Finding last player");

            match self.locator.locate(metric, prior).await {
                Ok(result) => {
                    if let Some(previous) = checkpoint.record(metric.name(), result.index) {
                        if result.index < previous {
                            warn!(
                                metric = %metric,
                                previous,
                                current = result.index,
                                "Boundary moved backwards; leaderboard shrank"
                            );
                        }
                    }
                    info!(
                        metric = %metric,
                        index = result.index,
                        "Found last ranked player, {}",
                        result.entry.name
                    );
                    report.results.push(result);
                }
                Err(e) => {
                    error!(metric = %metric, error = %e, "Search failed, skipping metric");
                    report.failures.push(MetricFailure {
                        metric: metric.name().to_string(),
                        error: e,
                    });
                }
            }
        }

        info!("Writing last ranks to checkpoint");
        self.store.save(&checkpoint).await?;
        report.checkpoint = checkpoint;

        info!(
            found = report.success_count(),
            failed = report.failure_count(),
            fetches = report.total_fetches(),
            "Last rank search complete"
        );

        match self.publish(&report.results).await {
            Ok(published) => report.published = published,
            Err(e) => report.publish_error = Some(e.to_string()),
        }

        Ok(report)
    }

    /// Collect the first page of every metric, keeping each player once.
    pub async fn run_leaders(&self) -> Result<LeadersReport> {
        let metrics = self.metrics();
        info!(metrics = metrics.len(), "Starting leaders run");

        let mut report = LeadersReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        for metric in metrics {
            info!(metric = %metric, "Fetching leaders");
            match self.locator.fetch_page(metric, 1).await {
                Ok((outcome, _)) => {
                    let entries = outcome.into_entries();
                    let found = entries.len();
                    let before = report.leaders.len();
                    report.leaders.extend(
                        entries
                            .into_iter()
                            .filter(|entry| seen.insert(entry.name.clone()))
                            .map(|entry| Leader {
                                metric: metric.name().to_string(),
                                entry,
                            }),
                    );
                    info!(
                        metric = %metric,
                        found,
                        unique = report.leaders.len() - before,
                        "Fetched leaders"
                    );
                }
                Err(e) => {
                    error!(metric = %metric, error = %e, "Failed to fetch leaders, skipping metric");
                    report.failures.push(MetricFailure {
                        metric: metric.name().to_string(),
                        error: e,
                    });
                }
            }
        }

        if report.leaders.is_empty() {
            info!("No leaders to publish");
        } else {
            match self.publisher.publish_leaders(&report.leaders).await {
                Ok(()) => report.published = true,
                Err(e) => {
                    error!(publisher = self.publisher.name(), error = %e, "Publishing leaders failed");
                    report.publish_error = Some(e.to_string());
                }
            }
        }

        Ok(report)
    }

    async fn publish(&self, results: &[BoundaryResult]) -> Result<bool> {
        if results.is_empty() {
            info!("No results to publish");
            return Ok(false);
        }

        self.publisher.publish(results).await.map_err(|e| {
            error!(publisher = self.publisher.name(), error = %e, "Publishing results failed");
            e
        })?;
        info!(publisher = self.publisher.name(), results = results.len(), "Published results");
        Ok(true)
    }
}
