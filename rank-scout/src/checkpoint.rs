//! Checkpoint persistence.
//!
//! A checkpoint maps each metric name to the boundary index found by the last
//! successful search. The JSON store replaces the file atomically: the new
//! content is written to a temporary file in the same directory, synced, then
//! renamed over the old one, so a reader never observes a partial write.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Last known boundary index per metric name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(BTreeMap<String, u64>);

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prior boundary for `metric`, if one was ever recorded.
    pub fn get(&self, metric: &str) -> Option<u64> {
        self.0.get(metric).copied()
    }

    /// Record a new boundary, returning the previous one.
    pub fn record(&mut self, metric: impl Into<String>, index: u64) -> Option<u64> {
        self.0.insert(metric.into(), index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u64)> for Checkpoint {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the persisted checkpoint; a store with no prior state yields an empty one.
    async fn load(&self) -> Result<Checkpoint>;

    /// Replace the persisted checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Checkpoint kept in a human-readable JSON file.
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for JsonCheckpointStore {
    async fn load(&self) -> Result<Checkpoint> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No checkpoint found, starting fresh");
                return Ok(Checkpoint::new());
            }
            Err(e) => return Err(Error::persistence("reading", &self.path, e)),
        };

        // Treat an empty file as "no value"
        if raw.trim().is_empty() {
            return Ok(Checkpoint::new());
        }

        let checkpoint: Checkpoint = serde_json::from_str(&raw)
            .map_err(|e| Error::persistence("parsing", &self.path, e))?;

        debug!(
            path = %self.path.display(),
            metrics = checkpoint.len(),
            "Loaded checkpoint"
        );
        Ok(checkpoint)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let data = serde_json::to_string_pretty(checkpoint)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, data.as_bytes()))
            .await
            .map_err(|e| Error::Other(format!("checkpoint writer task failed: {}", e)))??;

        info!(
            path = %self.path.display(),
            metrics = checkpoint.len(),
            "Wrote checkpoint"
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| Error::persistence("creating directory", dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::persistence("creating temp file", dir, e))?;
    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::persistence("writing", tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| Error::persistence("replacing", path, e.error))?;
    Ok(())
}

/// Checkpoint held in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    checkpoint: Checkpoint,
    saves: usize,
    fail_saves: bool,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                checkpoint,
                ..Default::default()
            }),
        }
    }

    /// Make every `save` fail with a persistence error.
    pub fn failing_saves(self) -> Self {
        self.state.lock().fail_saves = true;
        self
    }

    /// Current stored checkpoint.
    pub fn snapshot(&self) -> Checkpoint {
        self.state.lock().checkpoint.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.state.lock().saves
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Checkpoint> {
        Ok(self.state.lock().checkpoint.clone())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_saves {
            return Err(Error::persistence(
                "writing",
                Path::new("<memory>"),
                "store is read-only",
            ));
        }
        state.checkpoint = checkpoint.clone();
        state.saves += 1;
        Ok(())
    }
}
