//! End-to-end runs over an in-memory leaderboard.

use std::sync::Arc;

use async_trait::async_trait;
use hiscores_client::{Metric, MetricRegistry, SyntheticBoard};
use parking_lot::Mutex;
use rank_scout::checkpoint::{Checkpoint, CheckpointStore, JsonCheckpointStore, MemoryCheckpointStore};
use rank_scout::locator::{BoundaryLocator, BoundaryResult, LocateError, SearchConfig};
use rank_scout::orchestrator::RunOrchestrator;
use rank_scout::publisher::{JsonReportPublisher, Leader, Publisher};
use rank_scout::rate_limiter::RateLimiter;
use rank_scout::retry::RetryPolicy;
use rank_scout::{Error, Result};
use tempfile::TempDir;

/// Records what it was asked to publish.
#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<Vec<String>>>,
    fail: bool,
}

impl RecordingPublisher {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, results: &[BoundaryResult]) -> Result<()> {
        if self.fail {
            return Err(Error::Other("group service unavailable".to_string()));
        }
        self.published
            .lock()
            .push(results.iter().map(|r| r.entry.name.clone()).collect());
        Ok(())
    }

    async fn publish_leaders(&self, leaders: &[Leader]) -> Result<()> {
        self.published
            .lock()
            .push(leaders.iter().map(|l| l.entry.name.clone()).collect());
        Ok(())
    }
}

const SIZES: [(&str, u64); 5] = [
    ("Attack", 1_342),
    ("Defence", 98_765),
    ("Strength", 5_000),
    ("Hitpoints", 250_001),
    ("Ranged", 24),
];

fn metrics() -> Vec<Metric> {
    SIZES
        .iter()
        .enumerate()
        .map(|(i, (name, _))| Metric::skill(*name, i as u32 + 1))
        .collect()
}

fn board() -> SyntheticBoard {
    SIZES
        .iter()
        .fold(SyntheticBoard::new(25), |board, (name, size)| {
            board.with_size(*name, *size)
        })
}

fn orchestrator(
    board: Arc<SyntheticBoard>,
    store: Arc<dyn CheckpointStore>,
    publisher: Arc<dyn Publisher>,
) -> RunOrchestrator<Arc<SyntheticBoard>> {
    let locator = BoundaryLocator::new(
        board,
        RateLimiter::unlimited(),
        RetryPolicy::immediate(1),
        SearchConfig::default(),
    );
    RunOrchestrator::new(
        locator,
        MetricRegistry::from_metrics(metrics()),
        store,
        publisher,
    )
}

#[tokio::test]
async fn test_failed_metric_is_skipped() {
    let board = Arc::new(board().with_broken("Strength"));
    let store = Arc::new(MemoryCheckpointStore::new());
    let publisher = Arc::new(RecordingPublisher::default());

    let report = orchestrator(board.clone(), store.clone(), publisher.clone())
        .run_last_ranks()
        .await
        .unwrap();

    assert_eq!(report.success_count(), 4);
    assert_eq!(report.failure_count(), 1);
    assert!(!report.is_complete());
    assert_eq!(report.failures[0].metric, "Strength");
    assert!(matches!(
        report.failures[0].error,
        LocateError::FetchFailure { attempts: 2, .. }
    ));

    let checkpoint = store.snapshot();
    assert_eq!(checkpoint.len(), 4);
    assert_eq!(checkpoint.get("Strength"), None);
    assert_eq!(checkpoint.get("Hitpoints"), Some(250_001));
    assert_eq!(store.save_count(), 1);

    // Results keep metric order.
    let names: Vec<_> = report.results.iter().map(|r| r.metric.as_str()).collect();
    assert_eq!(names, ["Attack", "Defence", "Hitpoints", "Ranged"]);
    assert_eq!(publisher.calls().len(), 1);
    assert_eq!(publisher.calls()[0][0], "Attack #1342");
}

#[tokio::test]
async fn test_unwritable_checkpoint_fails_run_before_publishing() {
    let board = Arc::new(board());
    let store = Arc::new(MemoryCheckpointStore::new().failing_saves());
    let publisher = Arc::new(RecordingPublisher::default());

    let err = orchestrator(board, store, publisher.clone())
        .run_last_ranks()
        .await
        .unwrap_err();

    assert!(err.is_persistence());
    assert!(publisher.calls().is_empty());
}

#[tokio::test]
async fn test_corrupt_checkpoint_fails_run_before_fetching() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("last_ranks.json");
    std::fs::write(&path, "[1, 2").unwrap();

    let board = Arc::new(board());
    let err = orchestrator(
        board.clone(),
        Arc::new(JsonCheckpointStore::new(&path)),
        Arc::new(RecordingPublisher::default()),
    )
    .run_last_ranks()
    .await
    .unwrap_err();

    assert!(err.is_persistence());
    assert_eq!(board.fetch_count(), 0);
}

#[tokio::test]
async fn test_publish_failure_keeps_checkpoint() {
    let board = Arc::new(board());
    let store = Arc::new(MemoryCheckpointStore::new());

    let report = orchestrator(board, store.clone(), Arc::new(RecordingPublisher::failing()))
        .run_last_ranks()
        .await
        .unwrap();

    assert!(!report.published);
    assert!(report.publish_error.is_some());
    assert_eq!(store.snapshot().len(), 5);
}

#[tokio::test]
async fn test_second_run_resumes_from_checkpoint_file() {
    let dir = TempDir::new().unwrap();
    let checkpoint_path = dir.path().join("last_ranks.json");
    let report_path = dir.path().join("report.json");
    let board = Arc::new(board());

    let first = orchestrator(
        board.clone(),
        Arc::new(JsonCheckpointStore::new(&checkpoint_path)),
        Arc::new(JsonReportPublisher::new(&report_path)),
    )
    .run_last_ranks()
    .await
    .unwrap();
    assert!(first.is_complete());
    let cold_fetches = board.fetch_count();

    let raw = std::fs::read_to_string(&checkpoint_path).unwrap();
    let on_disk: Checkpoint = serde_json::from_str(&raw).unwrap();
    assert_eq!(on_disk, first.checkpoint);
    for (name, size) in SIZES {
        assert_eq!(on_disk.get(name), Some(size));
    }

    board.clear_log();
    let second = orchestrator(
        board.clone(),
        Arc::new(JsonCheckpointStore::new(&checkpoint_path)),
        Arc::new(JsonReportPublisher::new(&report_path)),
    )
    .run_last_ranks()
    .await
    .unwrap();

    assert_eq!(second.checkpoint, first.checkpoint);
    assert_eq!(board.fetch_count(), SIZES.len());
    assert!(board.fetch_count() < cold_fetches);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["players"].as_array().unwrap().len(), SIZES.len());
}

#[tokio::test]
async fn test_grown_leaderboard_is_tracked() {
    let store = Arc::new(MemoryCheckpointStore::with_checkpoint(
        [("Attack".to_string(), 1_300)].into_iter().collect(),
    ));

    let report = orchestrator(
        Arc::new(board()),
        store.clone(),
        Arc::new(RecordingPublisher::default()),
    )
    .run_last_ranks()
    .await
    .unwrap();

    assert_eq!(report.results[0].index, 1_342);
    assert_eq!(store.snapshot().get("Attack"), Some(1_342));
}

#[tokio::test]
async fn test_leaders_run() {
    let board = Arc::new(board());
    let store = Arc::new(MemoryCheckpointStore::new());
    let publisher = Arc::new(RecordingPublisher::default());

    let report = orchestrator(board.clone(), store.clone(), publisher.clone())
        .run_leaders()
        .await
        .unwrap();

    // Ranged has 24 players, every other metric a full first page.
    assert_eq!(report.leaders.len(), 4 * 25 + 24);
    assert!(report.failures.is_empty());
    assert_eq!(board.fetch_count(), SIZES.len());
    assert!(board.fetch_log().iter().all(|(_, index)| *index == 1));
    assert_eq!(publisher.calls().len(), 1);
    assert_eq!(store.save_count(), 0);
}
