//! Page fetching.
//!
//! [`PageFetcher`] is the only capability the rank scout needs from the
//! remote: read the rows at one index of one metric, or learn that the index
//! is past the end of the table.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

use crate::entry::Entry;
use crate::error::FetchError;
use crate::metric::{Metric, MetricKind};

/// Default remote host.
pub const DEFAULT_BASE_URL: &str = "https://secure.runescape.com";

/// Default user agent; the remote rejects obviously scripted agents.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/119.0";

/// Result of reading one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Rows at the index, in rank order. May be empty.
    Page(Vec<Entry>),
    /// The remote reported the index as absent (e.g. HTTP 404).
    NotFound,
}

impl FetchOutcome {
    /// Rows at the index; empty for [`FetchOutcome::NotFound`].
    pub fn entries(&self) -> &[Entry] {
        match self {
            FetchOutcome::Page(entries) => entries,
            FetchOutcome::NotFound => &[],
        }
    }

    pub fn into_entries(self) -> Vec<Entry> {
        match self {
            FetchOutcome::Page(entries) => entries,
            FetchOutcome::NotFound => Vec::new(),
        }
    }

    /// `true` when the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Read the rows of `metric` at `index`.
    ///
    /// Transport and decoding failures are errors; an index past the end of
    /// the table is an `Ok` with no rows.
    async fn fetch(&self, metric: &Metric, index: u64) -> Result<FetchOutcome, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, metric: &Metric, index: u64) -> Result<FetchOutcome, FetchError> {
        (**self).fetch(metric, index).await
    }
}

/// One row as served by the remote.
///
/// Which optional fields must be present depends on the metric kind.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    pub rank: u64,
    pub name: String,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default, alias = "xp")]
    pub experience: Option<u64>,
    #[serde(default)]
    pub score: Option<u64>,
}

impl RawRow {
    /// Convert into a typed entry, selecting the score variant by `kind`.
    pub fn into_entry(self, kind: MetricKind) -> Result<Entry, FetchError> {
        let rank = self.rank;
        let name = clean_name(&self.name);
        match kind {
            MetricKind::Skill => {
                let level = self.level.ok_or(FetchError::MissingField {
                    rank,
                    field: "level",
                })?;
                let experience = self.experience.ok_or(FetchError::MissingField {
                    rank,
                    field: "experience",
                })?;
                Ok(Entry::skill(name, rank, level, experience))
            }
            MetricKind::Activity => {
                let score = self.score.ok_or(FetchError::MissingField {
                    rank,
                    field: "score",
                })?;
                Ok(Entry::activity(name, rank, score))
            }
        }
    }
}

/// Names come back with non-breaking spaces in place of regular ones.
fn clean_name(raw: &str) -> String {
    raw.trim().replace('\u{a0}', " ")
}

/// Settings for [`HttpPageFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Read the seasonal (leagues) tables instead of the regular ones.
    pub seasonal: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            seasonal: false,
        }
    }
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Fetches pages from the remote hiscores over HTTP.
///
/// The endpoint is expected to answer with a JSON array of [`RawRow`] and a
/// `404` for pages past the end of the table.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    base_url: Url,
    seasonal: bool,
}

impl HttpPageFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        install_rustls_provider();

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Self::with_client(client, config)
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: Client, config: &FetcherConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(config.base_url.clone()));
        }

        Ok(Self {
            client,
            base_url,
            seasonal: config.seasonal,
        })
    }

    /// Build the URL of one page of one metric.
    pub fn page_url(&self, metric: &Metric, index: u64) -> Result<Url, FetchError> {
        let mode = if self.seasonal {
            "hiscore_oldschool_seasonal"
        } else {
            "hiscore_oldschool"
        };

        let mut url = self
            .base_url
            .join(&format!("m={mode}/overall.json"))
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(category) = metric.category() {
                query.append_pair("category_type", &category.to_string());
            }
            query.append_pair("table", &metric.table().to_string());
            query.append_pair(metric.index_mode().query_key(), &index.to_string());
        }

        Ok(url)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, metric: &Metric, index: u64) -> Result<FetchOutcome, FetchError> {
        let url = self.page_url(metric, index)?;
        trace!(metric = %metric, index, url = %url, "fetching page");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(metric = %metric, index, "page not found");
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let rows: Vec<RawRow> = serde_json::from_str(&body)?;
        let kind = metric.kind();
        let entries = rows
            .into_iter()
            .map(|row| row.into_entry(kind))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(metric = %metric, index, rows = entries.len(), "fetched page");
        Ok(FetchOutcome::Page(entries))
    }
}
