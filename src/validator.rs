//! Item validation and document-level correction.
//!
//! [`validate`] checks one fetched batch against the minimal shape rules for
//! its kind and returns a corrected copy plus advisory notes. It never fails:
//! upstream sources are unreliable, so every problem is either fixed (dead or
//! placeholder links, blank highlights) or the offending item is dropped.
//!
//! [`correct_document`] runs after merging and fills the derived fields that
//! must not be empty on a served document.

use crate::config::NewsConfig;
use crate::freshness::classify_age;
use crate::merger::derive_keywords;
use crate::models::{
    DailyDocument, NintendoDeals, PreorderFigure, PremiumFigure, PsDeal, RawBatch,
    RawNews, SteamDeal,
};
use crate::utils::char_prefix;
use chrono::{DateTime, Utc};
use url::Url;

/// Result of validating one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// `false` when the batch is below its size floor or items had to be dropped.
    pub valid: bool,
    pub corrected: RawBatch,
    /// One note per fix or drop, in item order.
    pub errors: Vec<String>,
}

/// Validate `batch` against the rules for its [`crate::models::ItemKind`].
pub fn validate(batch: &RawBatch, rules: &NewsConfig) -> ValidationReport {
    let mut errors = Vec::new();
    let mut below_floor = false;
    let (corrected, dropped) = match batch {
        RawBatch::News(items) => {
            let (kept, dropped) = validate_news(items, rules, &mut errors);
            if kept.len() < rules.min_items {
                errors.push(format!(
                    "too few news items: {} (need at least {})",
                    kept.len(),
                    rules.min_items
                ));
                below_floor = true;
            }
            (RawBatch::News(kept), dropped)
        }
        RawBatch::Bandai(items) => {
            let kept = retain_displayable(items, &mut errors, |p: &PreorderFigure| {
                (p.name.as_str(), p.price.as_str())
            });
            let dropped = items.len() - kept.len();
            (RawBatch::Bandai(kept), dropped)
        }
        RawBatch::HotToys(items) => {
            let kept = retain_displayable(items, &mut errors, |p: &PremiumFigure| {
                (p.name.as_str(), p.price.as_str())
            });
            let dropped = items.len() - kept.len();
            (RawBatch::HotToys(kept), dropped)
        }
        RawBatch::Steam(items) => {
            let kept = retain_displayable(items, &mut errors, |d: &SteamDeal| {
                (d.name.as_str(), d.discount_price.as_str())
            });
            let dropped = items.len() - kept.len();
            (RawBatch::Steam(kept), dropped)
        }
        RawBatch::PlayStation(items) => {
            let kept = retain_displayable(items, &mut errors, |d: &PsDeal| {
                (d.name.as_str(), d.price_hkd.as_str())
            });
            let dropped = items.len() - kept.len();
            (RawBatch::PlayStation(kept), dropped)
        }
        RawBatch::Nintendo(n) => {
            let deals = retain_displayable(&n.deals, &mut errors, |d| {
                (d.name.as_str(), d.price.as_deref().unwrap_or(""))
            });
            let dropped = n.deals.len() - deals.len();
            let corrected = NintendoDeals {
                has_deals: n.has_deals && !deals.is_empty(),
                deals,
                note: n.note.clone(),
            };
            (RawBatch::Nintendo(corrected), dropped)
        }
    };

    ValidationReport {
        valid: dropped == 0 && !below_floor,
        corrected,
        errors,
    }
}

fn validate_news(
    items: &[RawNews],
    rules: &NewsConfig,
    errors: &mut Vec<String>,
) -> (Vec<RawNews>, usize) {
    let mut kept = Vec::with_capacity(items.len());
    let mut dropped = 0;

    for (i, item) in items.iter().enumerate() {
        let title = item.title.trim();
        if title.is_empty() {
            errors.push(format!("news #{} from {}: empty title, dropped", i + 1, item.source));
            dropped += 1;
            continue;
        }

        let mut fixed = item.clone();
        fixed.title = title.to_string();

        let link_ok = item
            .url
            .as_deref()
            .is_some_and(|u| is_allowed_link(u, &rules.disallowed_domains));
        if !link_ok {
            let replacement = search_fallback_url(&rules.search_fallback_base, title);
            errors.push(format!(
                "[{}...] link {} replaced with {}",
                char_prefix(title, 15),
                item.url.as_deref().unwrap_or("(missing)"),
                replacement
            ));
            fixed.url = Some(replacement);
        }

        if fixed.summary.trim().is_empty() {
            fixed.summary = rules.default_highlight.clone();
        }
        if fixed.tags.is_empty() {
            fixed.tags = rules.default_keywords.clone();
        }
        kept.push(fixed);
    }

    (kept, dropped)
}

fn retain_displayable<T, F>(items: &[T], errors: &mut Vec<String>, fields: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> (&str, &str),
{
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let (name, price) = fields(item);
            if name.trim().is_empty() {
                errors.push(format!("item #{}: empty name, dropped", i + 1));
                None
            } else if price.trim().is_empty() {
                errors.push(format!("[{}] empty price, dropped", name.trim()));
                None
            } else {
                Some(item.clone())
            }
        })
        .collect()
}

/// A link is usable when it parses as http(s) and its host is not one of the
/// placeholder domains (or a subdomain of one).
pub fn is_allowed_link(link: &str, disallowed_domains: &[String]) -> bool {
    let Ok(parsed) = Url::parse(link.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    !disallowed_domains
        .iter()
        .any(|d| host == d || host.ends_with(&format!(".{d}")))
}

/// Deterministic same-ecosystem search link for a title.
pub fn search_fallback_url(base: &str, title: &str) -> String {
    format!("{base}{}", urlencoding::encode(&char_prefix(title.trim(), 10)))
}

/// A document after the correction pass, with what was changed.
#[derive(Debug, Clone)]
pub struct CorrectedDocument {
    pub document: DailyDocument,
    pub corrections: Vec<String>,
    pub warnings: Vec<String>,
}

/// Fill derived fields and label the document's age.
///
/// Consumes the draft and returns a new document; nothing already persisted
/// is touched.
pub fn correct_document(
    mut draft: DailyDocument,
    rules: &NewsConfig,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> CorrectedDocument {
    let mut corrections = Vec::new();
    let mut warnings = Vec::new();

    if draft.news.len() < rules.min_items {
        warnings.push(format!("news list still short: {} items", draft.news.len()));
    }

    for item in &mut draft.news {
        if item.keywords.is_empty() {
            item.keywords = rules.default_keywords.clone();
            corrections.push(format!(
                "[{}] default keywords applied",
                char_prefix(&item.title, 15)
            ));
        }
        if item.highlight.trim().is_empty() {
            item.highlight = rules.default_highlight.clone();
        }
    }

    let contiguous = draft
        .news
        .iter()
        .enumerate()
        .all(|(i, n)| n.rank as usize == i + 1);
    if !contiguous {
        for (i, item) in draft.news.iter_mut().enumerate() {
            item.rank = (i + 1) as u32;
        }
        corrections.push("news ranks re-assigned".to_string());
    }

    if draft.keywords.is_empty() {
        draft.keywords = derive_keywords(&draft.news, rules.keyword_count);
        corrections.push("keywords regenerated".to_string());
    }

    let freshness = classify_age(now - draft.generated_at, threshold);
    if freshness != crate::models::Freshness::Fresh {
        warnings.push(format!(
            "document generated at {} is {:?}",
            draft.generated_at, freshness
        ));
    }
    draft.data_quality.freshness = freshness;

    CorrectedDocument {
        document: draft,
        corrections,
        warnings,
    }
}
