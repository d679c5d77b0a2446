//! Upstream fetchers for news, figures and game deals.
//!
//! Every fetcher implements [`RawFetcher`] and is failure-isolated: network
//! errors, timeouts and unparsable payloads are logged inside the fetcher and
//! come back as an empty batch (or a catalog pick where one exists). Nothing
//! here returns an error to the pipeline.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Batch |
//! |--------|--------|--------|-------|
//! | 36Kr | [`rss`] | RSS feed | news (primary) |
//! | Zhihu hot list | [`zhihu`] | JSON API | news (secondary) |
//! | ITHome | [`rss`] | RSS feed | news (tertiary) |
//! | Bandai schedule | [`bandai`] | HTML scraping, catalog fallback | pre-order figures |
//! | Hot Toys | [`catalog`] | catalog picks | premium figures |
//! | Steam | [`steam`] | JSON API, catalog fallback | deals |
//! | PlayStation HK | [`catalog`] | catalog | deals |
//! | Nintendo | [`catalog`] | none | empty list with a note |

pub mod bandai;
pub mod catalog;
pub mod rss;
pub mod steam;
pub mod zhihu;

use crate::config::{HttpConfig, PipelineConfig, TagRule};
use crate::error::PipelineError;
use crate::models::RawBatch;
use chrono::NaiveDate;
use futures::future::{BoxFuture, join_all};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{Duration as StdDuration, Instant};
use tracing::{info, instrument, warn};

/// Tags attached to one news item at most.
pub const MAX_TAGS: usize = 3;

/// One upstream source.
pub trait RawFetcher: Send + Sync {
    /// Label recorded in `source` fields and `dataQuality.sources`.
    fn name(&self) -> &str;

    /// Fetch the batch for the document dated `date`. Never fails.
    fn fetch(&self, date: NaiveDate) -> BoxFuture<'_, RawBatch>;
}

/// Shared HTTP client with the configured timeout and user agent.
pub fn http_client(config: &HttpConfig) -> Result<reqwest::Client, PipelineError> {
    let client = reqwest::Client::builder()
        .timeout(StdDuration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Every fetcher in merge-priority order: news sources first (36Kr, Zhihu,
/// ITHome), then figures and deals.
pub fn default_fetchers(
    config: &PipelineConfig,
    client: &reqwest::Client,
) -> Vec<Box<dyn RawFetcher>> {
    vec![
        Box::new(rss::RssFeed::new(
            "36Kr",
            &config.sources.kr36_rss,
            client.clone(),
            config.news.clone(),
        )),
        Box::new(zhihu::ZhihuHot::new(
            &config.sources.zhihu_hot,
            client.clone(),
            config.news.clone(),
        )),
        Box::new(rss::RssFeed::new(
            "ITHome",
            &config.sources.ithome_rss,
            client.clone(),
            config.news.clone(),
        )),
        Box::new(bandai::BandaiSchedule::new(
            &config.sources.bandai_schedule,
            client.clone(),
            config.catalog.clone(),
            config.exchange_rates.jpy_to_cny,
        )),
        Box::new(catalog::HotToysCatalog::new(
            config.catalog.clone(),
            config.exchange_rates.hkd_to_cny,
        )),
        Box::new(steam::SteamSpecials::new(
            &config.sources.steam_featured,
            client.clone(),
            config.catalog.steam.clone(),
        )),
        Box::new(catalog::PlayStationCatalog::new(
            config.catalog.playstation.clone(),
            config.exchange_rates.hkd_to_cny,
        )),
        Box::new(catalog::NintendoNotice::new(config.catalog.nintendo_note.clone())),
    ]
}

/// Run all fetchers concurrently and wait for every one of them.
///
/// Results come back in the same order as `fetchers`, paired with each
/// fetcher's name.
#[instrument(level = "info", skip_all, fields(%date, fetchers = fetchers.len()))]
pub async fn fetch_all(
    fetchers: &[Box<dyn RawFetcher>],
    date: NaiveDate,
) -> Vec<(String, RawBatch)> {
    let t0 = Instant::now();
    let batches = join_all(fetchers.iter().map(|f| async move {
        let batch = f.fetch(date).await;
        (f.name().to_string(), batch)
    }))
    .await;

    for (name, batch) in &batches {
        if batch.is_empty() {
            warn!(source = %name, "Fetcher returned nothing");
        } else {
            info!(source = %name, count = batch.len(), "Fetcher returned items");
        }
    }
    info!(elapsed_ms = t0.elapsed().as_millis(), "All fetchers settled");
    batches
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Remove HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    SPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// True when `text` mentions any of `terms` (ASCII case-insensitive).
pub fn is_relevant(text: &str, terms: &[String]) -> bool {
    let lowered = text.to_lowercase();
    terms.iter().any(|t| lowered.contains(&t.to_lowercase()))
}

/// Tags for `text` from the first matching rules, deduplicated, at most
/// [`MAX_TAGS`]. Falls back to `AI` when nothing matches.
pub fn extract_tags(text: &str, rules: &[TagRule]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for rule in rules.iter().filter(|r| text.contains(&r.term)) {
        for tag in &rule.tags {
            if tags.len() >= MAX_TAGS {
                return tags;
            }
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
    }
    if tags.is_empty() {
        tags.push("AI".to_string());
    }
    tags
}

/// Resolve a possibly relative link against `base`.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}
