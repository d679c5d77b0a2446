//! Data models for the daily digest and its companion status record.
//!
//! This module defines the core data structures used throughout the application:
//! - [`DailyDocument`]: the dated unit of truth served to the website
//! - [`NewsItem`], [`PreorderFigure`], [`PremiumFigure`]: ranked news and collectibles
//! - [`SteamDeal`], [`PsDeal`], [`NintendoDeals`]: per-storefront game deals
//! - [`SyncStatus`]: outcome of the most recent generation attempt
//! - [`RawBatch`] / [`RawNews`]: what a fetcher hands to the validator
//!
//! Documents are serialized with camelCase keys; the JSON files on disk are read
//! by the website as-is.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One ranked entry of the AI news list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    /// Position in the merged list, contiguous from 1.
    pub rank: u32,
    pub title: String,
    pub keywords: Vec<String>,
    pub highlight: String,
    pub url: String,
    /// Label of the fetcher (or `"backup"`) that contributed the item.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
}

/// A pre-order figure or model kit (Bandai schedule), priced in yen.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreorderFigure {
    pub id: String,
    pub name: String,
    pub series: String,
    /// Display price in native currency, e.g. `¥3,850`.
    pub price: String,
    #[serde(rename = "priceJPY")]
    pub price_jpy: u32,
    #[serde(rename = "priceCNY", default, skip_serializing_if = "Option::is_none")]
    pub price_cny: Option<u32>,
    pub release_date: NaiveDate,
    /// `新品`, `再版`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A premium figure (Hot Toys), priced in Hong Kong dollars.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumFigure {
    pub id: String,
    pub name: String,
    pub series: String,
    pub price: String,
    #[serde(rename = "priceHKD")]
    pub price_hkd: u32,
    #[serde(rename = "priceCNY", default, skip_serializing_if = "Option::is_none")]
    pub price_cny: Option<u32>,
    pub announce_date: NaiveDate,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SteamDealKind {
    NewLow,
    HistoricalLow,
    DailyDeal,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SteamDeal {
    pub id: String,
    pub name: String,
    pub original_price: String,
    pub discount_price: String,
    /// Percentage label, e.g. `-50%`.
    pub discount: String,
    #[serde(rename = "type")]
    pub kind: SteamDealKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A time-bounded PlayStation Store (HK region) deal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsDeal {
    pub id: String,
    pub name: String,
    #[serde(rename = "priceHKD")]
    pub price_hkd: String,
    #[serde(rename = "priceCNY", default, skip_serializing_if = "Option::is_none")]
    pub price_cny: Option<u32>,
    pub discount: String,
    pub event_name: String,
    /// Last day the deal is valid.
    pub valid_until: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Region {
    JP,
    HK,
    US,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchDeal {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<String>,
    pub region: Region,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NintendoDeals {
    pub has_deals: bool,
    pub deals: Vec<SwitchDeal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Age label stamped into [`DataQuality`] when a document is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Warning,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataQuality {
    pub freshness: Freshness,
    /// Fetchers that returned at least one item.
    pub sources: Vec<String>,
    /// Derived by the confidence scorer; never set by hand.
    pub confidence: u8,
}

/// The digest for one calendar day.
///
/// A document is written once per generation run and never edited in place;
/// a later run for the same date replaces the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDocument {
    /// Identity key, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub keywords: Vec<String>,
    pub news: Vec<NewsItem>,
    /// Pre-order figures.
    pub bandai: Vec<PreorderFigure>,
    /// Premium figures.
    pub hot_toys: Vec<PremiumFigure>,
    pub steam: Vec<SteamDeal>,
    pub playstation: Vec<PsDeal>,
    pub nintendo: NintendoDeals,
    /// When the document was created; distinct from `date`.
    pub generated_at: DateTime<Utc>,
    pub data_quality: DataQuality,
}

/// Outcome of the most recent generation or sync attempt.
///
/// Overwritten on every attempt, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub success: bool,
    /// The "today" the attempt ran for.
    pub date: NaiveDate,
    /// Tier that produced the serving document: `today`, `yesterday`,
    /// `history-YYYY-MM-DD`, `static`, or `error`.
    pub source: String,
    pub is_fresh: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A news entry as scraped, before validation and ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNews {
    pub title: String,
    pub summary: String,
    pub url: Option<String>,
    pub tags: Vec<String>,
    pub source: String,
    pub image: Option<String>,
    pub publish_time: Option<String>,
}

/// Coarse item class the validator applies rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    News,
    Product,
    Deal,
}

/// Output of one fetcher, tagged by what it fetched.
///
/// Fetchers never hand partially shaped data past this type: every variant
/// carries fully typed items, and the validator enforces the required-field
/// contract before anything reaches the merger.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBatch {
    News(Vec<RawNews>),
    Bandai(Vec<PreorderFigure>),
    HotToys(Vec<PremiumFigure>),
    Steam(Vec<SteamDeal>),
    PlayStation(Vec<PsDeal>),
    Nintendo(NintendoDeals),
}

impl RawBatch {
    pub fn kind(&self) -> ItemKind {
        match self {
            RawBatch::News(_) => ItemKind::News,
            RawBatch::Bandai(_) | RawBatch::HotToys(_) => ItemKind::Product,
            RawBatch::Steam(_) | RawBatch::PlayStation(_) | RawBatch::Nintendo(_) => {
                ItemKind::Deal
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawBatch::News(items) => items.len(),
            RawBatch::Bandai(items) => items.len(),
            RawBatch::HotToys(items) => items.len(),
            RawBatch::Steam(items) => items.len(),
            RawBatch::PlayStation(items) => items.len(),
            RawBatch::Nintendo(n) => n.deals.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_item_serializes_camel_case() {
        let item = NewsItem {
            id: "news-1".to_string(),
            rank: 1,
            title: "OpenAI ships a new model".to_string(),
            keywords: vec!["AI".to_string()],
            highlight: "Summary".to_string(),
            url: "https://36kr.com/p/1".to_string(),
            source: "36Kr".to_string(),
            image: None,
            publish_time: Some("Fri, 27 Feb 2026 08:00:00 +0800".to_string()),
        };

        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"publishTime\""));
        assert!(!json.contains("\"image\""));
    }

    #[test]
    fn test_figure_price_fields_keep_currency_suffix() {
        let figure = PreorderFigure {
            id: "b1".to_string(),
            name: "RG 1/144 RX-78-2".to_string(),
            series: "Mobile Suit Gundam".to_string(),
            price: "¥3,850".to_string(),
            price_jpy: 3850,
            price_cny: Some(185),
            release_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            kind: "新品".to_string(),
            image: None,
            url: None,
        };

        let json = serde_json::to_string(&figure).unwrap();
        assert!(json.contains("\"priceJPY\":3850"));
        assert!(json.contains("\"priceCNY\":185"));
        assert!(json.contains("\"releaseDate\":\"2026-03-14\""));
        assert!(json.contains("\"type\":\"新品\""));
    }

    #[test]
    fn test_steam_deal_kind_is_kebab_case() {
        let json = serde_json::to_string(&SteamDealKind::HistoricalLow).unwrap();
        assert_eq!(json, "\"historical-low\"");
    }

    #[test]
    fn test_sync_status_deserialization() {
        let json = r#"{
            "success": true,
            "date": "2026-02-27",
            "source": "today",
            "isFresh": true,
            "timestamp": "2026-02-27T01:00:00Z"
        }"#;

        let status: SyncStatus = serde_json::from_str(json).unwrap();
        assert!(status.success);
        assert_eq!(status.date, NaiveDate::from_ymd_opt(2026, 2, 27).unwrap());
        assert_eq!(status.error, None);
    }

    #[test]
    fn test_sync_status_rejects_invalid_date() {
        let json = r#"{
            "success": true,
            "date": "2026-02-30",
            "source": "today",
            "isFresh": true,
            "timestamp": "2026-02-27T01:00:00Z"
        }"#;

        assert!(serde_json::from_str::<SyncStatus>(json).is_err());
    }

    #[test]
    fn test_raw_batch_kind_and_len() {
        let news = RawBatch::News(vec![]);
        assert_eq!(news.kind(), ItemKind::News);
        assert!(news.is_empty());

        let nintendo = RawBatch::Nintendo(NintendoDeals {
            has_deals: false,
            deals: vec![],
            note: Some("No deals this week".to_string()),
        });
        assert_eq!(nintendo.kind(), ItemKind::Deal);
        assert_eq!(nintendo.len(), 0);
        assert_eq!(RawBatch::HotToys(vec![]).kind(), ItemKind::Product);
    }
}
