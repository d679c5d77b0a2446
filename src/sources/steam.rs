//! Steam featured specials, with a catalog fallback.

use super::RawFetcher;
use crate::config::SteamEntry;
use crate::error::PipelineError;
use crate::models::{RawBatch, SteamDeal, SteamDealKind};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{info, instrument, warn};

const LABEL: &str = "Steam";
const MAX_ITEMS: usize = 8;
/// Discounts at or above this are labelled historical lows.
const HISTORICAL_LOW_PERCENT: u32 = 75;

#[derive(Debug, Deserialize)]
struct Featured {
    specials: Option<Specials>,
}

#[derive(Debug, Deserialize)]
struct Specials {
    #[serde(default)]
    items: Vec<SpecialItem>,
}

#[derive(Debug, Deserialize)]
struct SpecialItem {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    discount_percent: u32,
    /// Prices are in cents (fen).
    original_price: Option<u64>,
    final_price: Option<u64>,
    header_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SteamSpecials {
    url: String,
    client: reqwest::Client,
    catalog: Vec<SteamEntry>,
}

impl SteamSpecials {
    pub fn new(url: &str, client: reqwest::Client, catalog: Vec<SteamEntry>) -> Self {
        SteamSpecials {
            url: url.to_string(),
            client,
            catalog,
        }
    }

    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn try_fetch(&self) -> Result<Vec<SteamDeal>, PipelineError> {
        let featured: Featured = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let deals = featured
            .specials
            .map(|s| s.items)
            .unwrap_or_default()
            .into_iter()
            .filter(|item| item.discount_percent > 0 && !item.name.trim().is_empty())
            .take(MAX_ITEMS)
            .enumerate()
            .map(|(i, item)| to_deal(i, item))
            .collect::<Vec<_>>();
        info!(count = deals.len(), "Parsed Steam specials");
        Ok(deals)
    }

    fn catalog_deals(&self) -> Vec<SteamDeal> {
        self.catalog
            .iter()
            .enumerate()
            .map(|(i, e)| SteamDeal {
                id: format!("steam-{}", i + 1),
                name: e.name.clone(),
                original_price: e.original_price.clone(),
                discount_price: e.discount_price.clone(),
                discount: e.discount.clone(),
                kind: e.kind,
                image: None,
                url: Some("https://store.steampowered.com/specials".to_string()),
            })
            .collect()
    }
}

fn yuan(cents: Option<u64>) -> String {
    format!("¥{}", cents.unwrap_or(0) / 100)
}

fn to_deal(index: usize, item: SpecialItem) -> SteamDeal {
    let kind = if item.discount_percent >= HISTORICAL_LOW_PERCENT {
        SteamDealKind::HistoricalLow
    } else {
        SteamDealKind::DailyDeal
    };
    SteamDeal {
        id: format!("steam-{}", index + 1),
        name: item.name.trim().to_string(),
        original_price: yuan(item.original_price),
        discount_price: yuan(item.final_price),
        discount: format!("-{}%", item.discount_percent),
        kind,
        image: item.header_image,
        url: Some(format!("https://store.steampowered.com/app/{}", item.id)),
    }
}

impl RawFetcher for SteamSpecials {
    fn name(&self) -> &str {
        LABEL
    }

    fn fetch(&self, _date: NaiveDate) -> BoxFuture<'_, RawBatch> {
        Box::pin(async move {
            let deals = match self.try_fetch().await {
                Ok(deals) if !deals.is_empty() => deals,
                Ok(_) => {
                    warn!(source = LABEL, "No specials listed; using catalog");
                    self.catalog_deals()
                }
                Err(e) => {
                    warn!(source = LABEL, error = %e, "Steam fetch failed; using catalog");
                    self.catalog_deals()
                }
            };
            RawBatch::Steam(deals)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(uri: &str) -> SteamSpecials {
        SteamSpecials::new(
            uri,
            reqwest::Client::new(),
            PipelineConfig::builtin().unwrap().catalog.steam,
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 27).unwrap()
    }

    #[tokio::test]
    async fn test_specials_are_priced_in_yuan() {
        let server = MockServer::start().await;
        let body = json!({
            "specials": {
                "items": [
                    {"id": 1086940, "name": "Baldur's Gate 3", "discount_percent": 50,
                     "original_price": 29800, "final_price": 14900},
                    {"id": 292030, "name": "The Witcher 3", "discount_percent": 80,
                     "original_price": 12700, "final_price": 2540,
                     "header_image": "https://cdn.example/w3.jpg"},
                    {"id": 1, "name": "Full price", "discount_percent": 0,
                     "original_price": 1000, "final_price": 1000}
                ]
            }
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let RawBatch::Steam(deals) = fetcher(&server.uri()).fetch(date()).await else {
            panic!("expected a steam batch");
        };
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0].original_price, "¥298");
        assert_eq!(deals[0].discount_price, "¥149");
        assert_eq!(deals[0].discount, "-50%");
        assert_eq!(deals[0].kind, SteamDealKind::DailyDeal);
        assert_eq!(
            deals[0].url.as_deref(),
            Some("https://store.steampowered.com/app/1086940")
        );
        assert_eq!(deals[1].kind, SteamDealKind::HistoricalLow);
        assert_eq!(deals[1].discount_price, "¥25");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let f = fetcher(&server.uri());
        let batch = f.fetch(date()).await;
        assert_eq!(batch.len(), f.catalog.len());
        assert!(!batch.is_empty());
    }

    #[tokio::test]
    async fn test_empty_specials_fall_back_to_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"specials": {"items": []}})))
            .mount(&server)
            .await;

        let f = fetcher(&server.uri());
        assert_eq!(f.fetch(date()).await.len(), f.catalog.len());
    }
}
