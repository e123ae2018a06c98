//! Application configuration.
//!
//! Every field has a default, so a missing file, an empty file and a file
//! that sets only a few keys are all valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hiscores_client::{FetcherConfig, IndexMode, MetricRegistry, fetcher};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::locator::SearchConfig;
use crate::rate_limiter::RateLimiterConfig;
use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Remote endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetcherSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    fetcher::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    fetcher::DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for FetcherSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search the seasonal (leagues) tables.
    #[serde(default)]
    pub seasonal: bool,
    /// Only visit the first N metrics.
    #[serde(default)]
    pub metric_limit: Option<usize>,
    /// How fetch indices are interpreted for every metric.
    #[serde(default)]
    pub index_mode: IndexMode,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub fetcher: FetcherSection,
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    /// Where the JSON report goes; results are only logged when unset.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("last_ranks.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            seasonal: false,
            metric_limit: None,
            index_mode: IndexMode::default(),
            search: SearchConfig::default(),
            rate_limit: RateLimiterConfig::default(),
            retry: RetryPolicy::default(),
            fetcher: FetcherSection::default(),
            checkpoint_path: default_checkpoint_path(),
            report_path: None,
            log_dir: default_log_dir(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or use the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("reading {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&raw)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| Error::config(format!("parsing: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.page_size == 0 {
            return Err(Error::config("search.page_size must be positive"));
        }
        if search.rank_skip == 0 || search.page_skip == 0 {
            return Err(Error::config("search skips must be positive"));
        }
        if search.max_rank == 0 || search.max_page == 0 {
            return Err(Error::config("search ceilings must be positive"));
        }
        if self.rate_limit.min_interval_ms == 0 {
            return Err(Error::config("rate_limit.min_interval_ms must be positive"));
        }
        if self.retry.max_backoff_ms < self.retry.backoff_ms {
            return Err(Error::config("retry.max_backoff_ms must not be below retry.backoff_ms"));
        }
        if self.metric_limit == Some(0) {
            return Err(Error::config("metric_limit must be positive when set"));
        }
        Ok(())
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            base_url: self.fetcher.base_url.clone(),
            user_agent: self.fetcher.user_agent.clone(),
            timeout: Duration::from_secs(self.fetcher.timeout_secs),
            seasonal: self.seasonal,
        }
    }

    /// Metrics tracked for this configuration, in run order.
    pub fn registry(&self) -> MetricRegistry {
        MetricRegistry::build(self.seasonal, self.index_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.checkpoint_path, PathBuf::from("last_ranks.json"));
        assert_eq!(config.rate_limit.min_interval_ms, 5_000);
        assert_eq!(config.search.max_rank, 2_000_000);
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::from_toml(
            r#"
            seasonal = true
            metric_limit = 3
            index_mode = "page"

            [search]
            page_size = 50

            [rate_limit]
            min_interval_ms = 1500
            "#,
        )
        .unwrap();

        assert!(config.seasonal);
        assert_eq!(config.metric_limit, Some(3));
        assert_eq!(config.index_mode, IndexMode::Page);
        assert_eq!(config.search.page_size, 50);
        assert_eq!(config.search.rank_skip, 25_000);
        assert_eq!(config.rate_limit.min_interval_ms, 1_500);
        assert!(config.fetcher_config().seasonal);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for raw in [
            "[search]\npage_size = 0",
            "[search]\nrank_skip = 0",
            "[rate_limit]\nmin_interval_ms = 0",
            "metric_limit = 0",
            "[retry]\nbackoff_ms = 10000\nmax_backoff_ms = 1000",
        ] {
            let err = AppConfig::from_toml(raw).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{raw}");
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rank-scout.toml");
        std::fs::write(&path, "checkpoint_path = \"state/ranks.json\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.checkpoint_path, PathBuf::from("state/ranks.json"));

        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
        assert_eq!(AppConfig::load(None).unwrap(), AppConfig::default());
    }
}
