//! Catalog-backed fetchers.
//!
//! Hot Toys and the PlayStation Store have no stable public listing, so their
//! batches are generated from the configured catalog. Nintendo has no source
//! at all and always reports an empty deal list with a note.

use super::RawFetcher;
use crate::config::{CatalogConfig, PsEntry};
use crate::models::{NintendoDeals, PremiumFigure, PsDeal, RawBatch};
use crate::utils::{convert_price, format_thousands};
use chrono::{Days, NaiveDate};
use futures::future::BoxFuture;
use rand::rng;
use rand::seq::index::sample;
use tracing::debug;

/// Pick `n` random entries, keeping catalog order.
pub fn pick<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    let amount = n.min(items.len());
    let mut indices = sample(&mut rng(), items.len(), amount).into_vec();
    indices.sort_unstable();
    indices.into_iter().map(|i| items[i].clone()).collect()
}

#[derive(Debug, Clone)]
pub struct HotToysCatalog {
    catalog: CatalogConfig,
    hkd_to_cny: f64,
}

impl HotToysCatalog {
    pub fn new(catalog: CatalogConfig, hkd_to_cny: f64) -> Self {
        HotToysCatalog {
            catalog,
            hkd_to_cny,
        }
    }

    fn figures(&self) -> Vec<PremiumFigure> {
        pick(&self.catalog.hot_toys, self.catalog.picks_per_day)
            .into_iter()
            .enumerate()
            .map(|(i, e)| PremiumFigure {
                id: format!("ht-{}", i + 1),
                name: e.name,
                series: e.series,
                price: format!("HK${}", format_thousands(e.price_hkd)),
                price_hkd: e.price_hkd,
                price_cny: Some(convert_price(e.price_hkd, self.hkd_to_cny)),
                announce_date: e.announce_date,
                status: e.status,
                image: None,
                url: Some("https://www.hottoys.com.hk/".to_string()),
            })
            .collect()
    }
}

impl RawFetcher for HotToysCatalog {
    fn name(&self) -> &str {
        "HotToys"
    }

    fn fetch(&self, _date: NaiveDate) -> BoxFuture<'_, RawBatch> {
        Box::pin(async move {
            let figures = self.figures();
            debug!(count = figures.len(), "Picked Hot Toys catalog entries");
            RawBatch::HotToys(figures)
        })
    }
}

#[derive(Debug, Clone)]
pub struct PlayStationCatalog {
    entries: Vec<PsEntry>,
    hkd_to_cny: f64,
}

impl PlayStationCatalog {
    pub fn new(entries: Vec<PsEntry>, hkd_to_cny: f64) -> Self {
        PlayStationCatalog {
            entries,
            hkd_to_cny,
        }
    }

    /// Every catalog deal, valid for `valid_days` from `date`.
    fn deals(&self, date: NaiveDate) -> Vec<PsDeal> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| PsDeal {
                id: format!("ps-{}", i + 1),
                name: e.name.clone(),
                price_hkd: format!("HK${}", format_thousands(e.price_hkd)),
                price_cny: Some(convert_price(e.price_hkd, self.hkd_to_cny)),
                discount: e.discount.clone(),
                event_name: e.event_name.clone(),
                valid_until: date
                    .checked_add_days(Days::new(e.valid_days))
                    .unwrap_or(date),
                image: None,
                url: Some("https://store.playstation.com/zh-hant-hk/pages/deals".to_string()),
            })
            .collect()
    }
}

impl RawFetcher for PlayStationCatalog {
    fn name(&self) -> &str {
        "PlayStation"
    }

    fn fetch(&self, date: NaiveDate) -> BoxFuture<'_, RawBatch> {
        Box::pin(async move { RawBatch::PlayStation(self.deals(date)) })
    }
}

#[derive(Debug, Clone)]
pub struct NintendoNotice {
    note: String,
}

impl NintendoNotice {
    pub fn new(note: String) -> Self {
        NintendoNotice { note }
    }
}

impl RawFetcher for NintendoNotice {
    fn name(&self) -> &str {
        "Nintendo"
    }

    fn fetch(&self, _date: NaiveDate) -> BoxFuture<'_, RawBatch> {
        Box::pin(async move {
            RawBatch::Nintendo(NintendoDeals {
                has_deals: false,
                deals: Vec::new(),
                note: Some(self.note.clone()),
            })
        })
    }
}
