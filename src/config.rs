//! Pipeline configuration.
//!
//! Every tunable the pipeline uses (thresholds, upstream URLs, the backup news
//! set and the product/deal catalogs) lives in [`PipelineConfig`], which is
//! built once at startup and passed into each component. The built-in defaults
//! ship as `config/default.yaml` and are compiled into the binary; `--config`
//! replaces them with a file of the same shape.

use crate::error::PipelineError;
use crate::models::SteamDealKind;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tracing::{info, instrument};

const BUILTIN_CONFIG: &str = include_str!("../config/default.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding one document file per date plus the status file.
    pub output_dir: PathBuf,
    /// Document files are named `{file_prefix}-{YYYY-MM-DD}.json`.
    pub file_prefix: String,
    /// Status file name, resolved against `output_dir`.
    pub status_file: PathBuf,
    /// Static snapshot re-exported after every sync and embedded at build time.
    pub snapshot_file: PathBuf,
    /// Age at which a same-day document stops counting as fresh. 25 rather than
    /// 24 to absorb scheduling jitter around midnight.
    pub freshness_threshold_hours: i64,
    /// How often `serve` re-evaluates freshness in the background.
    pub watch_interval_minutes: u64,
    pub retry: RetryConfig,
    pub http: HttpConfig,
    pub news: NewsConfig,
    pub sources: SourceUrls,
    pub exchange_rates: ExchangeRates,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub interval_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    /// A news batch smaller than this is flagged and padded from `backup`.
    pub min_items: usize,
    pub max_items: usize,
    pub max_backup_items: usize,
    pub keyword_count: usize,
    /// Links pointing at these domains are replaced with a search fallback.
    pub disallowed_domains: Vec<String>,
    pub search_fallback_base: String,
    pub default_keywords: Vec<String>,
    pub default_highlight: String,
    /// An item is kept only if its title or summary mentions one of these.
    pub relevance_terms: Vec<String>,
    pub tag_rules: Vec<TagRule>,
    pub backup: Vec<BackupNews>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagRule {
    pub term: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupNews {
    pub title: String,
    pub keywords: Vec<String>,
    pub highlight: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceUrls {
    pub kr36_rss: String,
    pub ithome_rss: String,
    pub zhihu_hot: String,
    pub steam_featured: String,
    /// Month schedule page; `YYYY-MM` is appended.
    pub bandai_schedule: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRates {
    pub jpy_to_cny: f64,
    pub hkd_to_cny: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub picks_per_day: usize,
    pub bandai: Vec<BandaiEntry>,
    pub hot_toys: Vec<HotToysEntry>,
    pub steam: Vec<SteamEntry>,
    pub playstation: Vec<PsEntry>,
    pub nintendo_note: String,
    /// Series assigned to scraped Bandai products; first matching term wins.
    pub series_rules: Vec<SeriesRule>,
    pub default_series: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesRule {
    pub term: String,
    pub series: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BandaiEntry {
    pub name: String,
    pub series: String,
    pub price_jpy: u32,
    pub release_date: NaiveDate,
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotToysEntry {
    pub name: String,
    pub series: String,
    pub price_hkd: u32,
    pub announce_date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SteamEntry {
    pub name: String,
    pub original_price: String,
    pub discount_price: String,
    pub discount: String,
    pub kind: SteamDealKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PsEntry {
    pub name: String,
    pub price_hkd: u32,
    pub discount: String,
    pub event_name: String,
    /// Deal window, counted from the document date.
    pub valid_days: u64,
}

impl PipelineConfig {
    /// The configuration compiled into the binary.
    pub fn builtin() -> Result<Self, PipelineError> {
        Self::from_yaml(BUILTIN_CONFIG)
    }

    /// Load from `path` when given, otherwise fall back to [`Self::builtin`].
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub async fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        match path {
            Some(p) => {
                let raw = tokio::fs::read_to_string(p).await?;
                let config = Self::from_yaml(&raw)?;
                info!(path = %p.display(), "Loaded configuration file");
                Ok(config)
            }
            None => {
                info!("Using built-in configuration");
                Self::builtin()
            }
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_yaml::from_str(raw)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), PipelineError> {
        if self.news.max_items == 0 {
            return Err(PipelineError::Config("news.max_items must be > 0".into()));
        }
        if self.news.min_items > self.news.max_items {
            return Err(PipelineError::Config(format!(
                "news.min_items ({}) exceeds news.max_items ({})",
                self.news.min_items, self.news.max_items
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::Config("retry.max_attempts must be > 0".into()));
        }
        if self.freshness_threshold_hours <= 0 {
            return Err(PipelineError::Config(
                "freshness_threshold_hours must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn status_path(&self) -> PathBuf {
        self.output_dir.join(&self.status_file)
    }

    pub fn freshness_threshold(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_threshold_hours)
    }

    pub fn retry_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.retry.interval_minutes * 60)
    }

    pub fn watch_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.watch_interval_minutes.max(1) * 60)
    }
}
