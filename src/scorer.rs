//! Confidence score for a generated document.
//!
//! Observability only: the score is logged and stored in `dataQuality` so
//! operators can spot a thin pull. Nothing reads it to decide what to serve.

use crate::models::DailyDocument;
use std::collections::HashSet;

const PER_SOURCE: u32 = 10;
const PER_NEWS_ITEM: u32 = 5;
const NEWS_CAP: u32 = 30;
const PER_FIGURE_COLLECTION: u32 = 15;
const PER_DEAL_COLLECTION: u32 = 10;
const KEYWORDS_BONUS: u32 = 10;
const MIN_KEYWORDS_FOR_BONUS: usize = 3;
const MAX_SCORE: u32 = 100;

/// Score `doc` in `[0, 100]`.
///
/// Distinct sources are counted from the news items themselves, so the value
/// depends only on the document's content. `dataQuality` is ignored.
pub fn score(doc: &DailyDocument) -> u8 {
    let sources = doc
        .news
        .iter()
        .map(|n| n.source.as_str())
        .collect::<HashSet<_>>()
        .len() as u32;

    let mut total = sources * PER_SOURCE;
    total += (doc.news.len() as u32 * PER_NEWS_ITEM).min(NEWS_CAP);
    if !doc.bandai.is_empty() {
        total += PER_FIGURE_COLLECTION;
    }
    if !doc.hot_toys.is_empty() {
        total += PER_FIGURE_COLLECTION;
    }
    if !doc.steam.is_empty() {
        total += PER_DEAL_COLLECTION;
    }
    if !doc.playstation.is_empty() {
        total += PER_DEAL_COLLECTION;
    }
    if doc.keywords.len() >= MIN_KEYWORDS_FOR_BONUS {
        total += KEYWORDS_BONUS;
    }

    u8::try_from(total.min(MAX_SCORE)).unwrap_or(u8::MAX)
}
