//! Downstream sinks for the players a run discovered.
//!
//! The orchestrator hands over its final list and does not care what the
//! sink does with it; publish-side retries are the sink's business.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use hiscores_client::Entry;
use serde::Serialize;
use tracing::{debug, info};

use crate::locator::BoundaryResult;
use crate::{Error, Result};

/// A top-ranked player of one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leader {
    pub metric: String,
    pub entry: Entry,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Publish the boundary players of a last-rank run.
    async fn publish(&self, results: &[BoundaryResult]) -> Result<()>;

    /// Publish the leaders collected by a leaders run.
    async fn publish_leaders(&self, leaders: &[Leader]) -> Result<()>;
}

/// Distinct player names, in first-seen order.
pub fn unique_players<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Logs every published player.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, results: &[BoundaryResult]) -> Result<()> {
        for result in results {
            info!(metric = %result.metric, index = result.index, "{}", result.entry);
        }
        let players = unique_players(results.iter().map(|r| r.entry.name.as_str()));
        info!(
            results = results.len(),
            players = players.len(),
            "Published last ranked players"
        );
        Ok(())
    }

    async fn publish_leaders(&self, leaders: &[Leader]) -> Result<()> {
        for leader in leaders {
            info!(metric = %leader.metric, "{}", leader.entry);
        }
        info!(leaders = leaders.len(), "Published leaders");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Report<'a, T> {
    kind: &'static str,
    generated_at: DateTime<Local>,
    /// Distinct player names across every metric.
    players: Vec<String>,
    results: &'a [T],
}

/// Writes the published players to a JSON report file.
#[derive(Debug, Clone)]
pub struct JsonReportPublisher {
    path: PathBuf,
}

impl JsonReportPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write<T: Serialize + Sync>(&self, report: &Report<'_, T>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&self.path, data).await.map_err(|e| {
            Error::Other(format!(
                "writing report {}: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!(path = %self.path.display(), kind = report.kind, "Wrote report");
        Ok(())
    }
}

#[async_trait]
impl Publisher for JsonReportPublisher {
    fn name(&self) -> &'static str {
        "json-report"
    }

    async fn publish(&self, results: &[BoundaryResult]) -> Result<()> {
        let report = Report {
            kind: "last_ranks",
            generated_at: Local::now(),
            players: unique_players(results.iter().map(|r| r.entry.name.as_str())),
            results,
        };
        self.write(&report).await
    }

    async fn publish_leaders(&self, leaders: &[Leader]) -> Result<()> {
        let report = Report {
            kind: "leaders",
            generated_at: Local::now(),
            players: unique_players(leaders.iter().map(|l| l.entry.name.as_str())),
            results: leaders,
        };
        self.write(&report).await
    }
}
