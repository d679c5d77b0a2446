//! Bandai hobby monthly release schedule.
//!
//! Scrapes the month page for `.schedule-item` cards. A failed request or a
//! page with no recognizable cards falls back to catalog picks.

use super::catalog::pick;
use super::{RawFetcher, absolutize};
use crate::config::CatalogConfig;
use crate::error::PipelineError;
use crate::models::{PreorderFigure, RawBatch};
use crate::utils::{char_prefix, convert_price, format_thousands};
use chrono::{Datelike, NaiveDate};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

const LABEL: &str = "Bandai";
const MAX_SCANNED: usize = 10;
const MAX_ITEMS: usize = 6;
const DEFAULT_DAY: u32 = 15;

static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3}(?:,\d{3})*)円").unwrap());
static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})月(\d{1,2})日?").unwrap());
static SLASH_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/\-](\d{1,2})\b").unwrap());

#[derive(Debug, Clone)]
pub struct BandaiSchedule {
    base_url: String,
    client: reqwest::Client,
    catalog: CatalogConfig,
    jpy_to_cny: f64,
}

impl BandaiSchedule {
    pub fn new(base_url: &str, client: reqwest::Client, catalog: CatalogConfig, jpy_to_cny: f64) -> Self {
        BandaiSchedule {
            base_url: base_url.to_string(),
            client,
            catalog,
            jpy_to_cny,
        }
    }

    fn month_url(&self, date: NaiveDate) -> String {
        format!("{}{}", self.base_url, date.format("%Y-%m"))
    }

    #[instrument(level = "info", skip_all, fields(%date))]
    async fn try_fetch(&self, date: NaiveDate) -> Result<Vec<PreorderFigure>, PipelineError> {
        let url = self.month_url(date);
        let html = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(bytes = html.len(), %url, "Downloaded schedule page");
        let figures = parse_schedule(&html, date, &url, &self.catalog, self.jpy_to_cny);
        info!(count = figures.len(), "Parsed schedule cards");
        Ok(figures)
    }

    fn catalog_figures(&self) -> Vec<PreorderFigure> {
        pick(&self.catalog.bandai, self.catalog.picks_per_day)
            .into_iter()
            .enumerate()
            .map(|(i, e)| PreorderFigure {
                id: format!("bandai-{}", i + 1),
                name: e.name,
                series: e.series,
                price: format!("¥{}", format_thousands(e.price_jpy)),
                price_jpy: e.price_jpy,
                price_cny: Some(convert_price(e.price_jpy, self.jpy_to_cny)),
                release_date: e.release_date,
                kind: e.kind,
                image: None,
                url: Some("https://www.bandaihobbysite.cn/".to_string()),
            })
            .collect()
    }
}

/// Parse the schedule cards of one month page.
pub fn parse_schedule(
    html: &str,
    month: NaiveDate,
    page_url: &str,
    catalog: &CatalogConfig,
    jpy_to_cny: f64,
) -> Vec<PreorderFigure> {
    let document = Html::parse_document(html);
    let Ok(card_sel) = Selector::parse(".schedule-item") else {
        return Vec::new();
    };

    document
        .select(&card_sel)
        .take(MAX_SCANNED)
        .filter_map(|card| parse_card(card, month, page_url, catalog, jpy_to_cny))
        .take(MAX_ITEMS)
        .enumerate()
        .map(|(i, mut figure)| {
            figure.id = format!("bandai-{}", i + 1);
            figure
        })
        .collect()
}

fn parse_card(
    card: ElementRef<'_>,
    month: NaiveDate,
    page_url: &str,
    catalog: &CatalogConfig,
    jpy_to_cny: f64,
) -> Option<PreorderFigure> {
    let title_sel = Selector::parse("[class*=title]").ok()?;
    let img_sel = Selector::parse("img").ok()?;
    let link_sel = Selector::parse("a[href]").ok()?;

    let img = card.select(&img_sel).next();
    let name = card
        .select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>())
        .filter(|t| !t.trim().is_empty())
        .or_else(|| img.and_then(|i| i.value().attr("alt")).map(str::to_string))?;
    let name = char_prefix(name.trim(), 60);
    if name.is_empty() {
        return None;
    }

    let text = card.text().collect::<Vec<_>>().join(" ");
    let price_jpy = PRICE_RE
        .captures(&text)
        .and_then(|c| c[1].replace(',', "").parse::<u32>().ok())
        .unwrap_or(0);
    let day = MONTH_DAY_RE
        .captures(&text)
        .or_else(|| SLASH_DAY_RE.captures(&text))
        .and_then(|c| c[2].parse::<u32>().ok())
        .unwrap_or(DEFAULT_DAY);
    let release_date = NaiveDate::from_ymd_opt(month.year(), month.month(), day)
        .or_else(|| NaiveDate::from_ymd_opt(month.year(), month.month(), DEFAULT_DAY))?;

    let series = catalog
        .series_rules
        .iter()
        .find(|r| name.contains(&r.term))
        .map(|r| r.series.clone())
        .unwrap_or_else(|| catalog.default_series.clone());

    Some(PreorderFigure {
        id: String::new(),
        series,
        price: if price_jpy > 0 {
            format!("¥{}", format_thousands(price_jpy))
        } else {
            "价格待定".to_string()
        },
        price_jpy,
        price_cny: (price_jpy > 0).then(|| convert_price(price_jpy, jpy_to_cny)),
        release_date,
        kind: "新品".to_string(),
        image: img
            .and_then(|i| i.value().attr("src"))
            .and_then(|src| absolutize(page_url, src)),
        url: card
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| absolutize(page_url, href))
            .or_else(|| Some(page_url.to_string())),
        name,
    })
}

impl RawFetcher for BandaiSchedule {
    fn name(&self) -> &str {
        LABEL
    }

    fn fetch(&self, date: NaiveDate) -> BoxFuture<'_, RawBatch> {
        Box::pin(async move {
            let figures = match self.try_fetch(date).await {
                Ok(figures) if !figures.is_empty() => figures,
                Ok(_) => {
                    warn!(source = LABEL, "No schedule cards found; using catalog");
                    self.catalog_figures()
                }
                Err(e) => {
                    warn!(source = LABEL, error = %e, "Schedule fetch failed; using catalog");
                    self.catalog_figures()
                }
            };
            RawBatch::Bandai(figures)
        })
    }
}
