//! Merging and ranking of news from several fetchers.
//!
//! Lists are merged in fetcher-priority order. Two items are considered the
//! same story when the first 20 characters of their lowercased titles match;
//! the first occurrence wins. Ranks coming from upstream are ignored and
//! re-assigned as 1..N on every merge.

use crate::config::BackupNews;
use crate::models::{NewsItem, RawNews};
use crate::utils::char_prefix;
use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use std::collections::HashMap;

/// Source label stamped on items spliced in from the backup set.
pub const BACKUP_SOURCE: &str = "backup";

const DEDUP_PREFIX_CHARS: usize = 20;

/// Placeholder in backup titles replaced by the document date (`2月27日`).
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Fingerprint used for de-duplication.
///
/// # Arguments
///
/// * `title` - A news title as scraped or configured
///
/// # Returns
///
/// The first 20 characters of the trimmed, lowercased title. Collisions are
/// accepted: two stories sharing that prefix are treated as one.
pub fn dedup_key(title: &str) -> String {
    char_prefix(&title.trim().to_lowercase(), DEDUP_PREFIX_CHARS)
}

/// Render a backup title for the document dated `date`.
pub fn backup_title(template: &str, date: NaiveDate) -> String {
    template.replace(
        DATE_PLACEHOLDER,
        &format!("{}月{}日", date.month(), date.day()),
    )
}

/// Merge validated lists, highest-priority first, into at most `max_items`
/// ranked news items.
pub fn merge(source_lists: &[Vec<RawNews>], max_items: usize) -> Vec<NewsItem> {
    let merged = source_lists
        .iter()
        .flatten()
        .unique_by(|item| dedup_key(&item.title))
        .take(max_items)
        .map(to_news_item)
        .collect::<Vec<_>>();
    rerank(merged)
}

fn to_news_item(raw: &RawNews) -> NewsItem {
    NewsItem {
        id: String::new(),
        rank: 0,
        title: raw.title.clone(),
        keywords: raw.tags.clone(),
        highlight: raw.summary.clone(),
        url: raw.url.clone().unwrap_or_default(),
        source: raw.source.clone(),
        image: raw.image.clone(),
        publish_time: raw.publish_time.clone(),
    }
}

/// Assign ranks 1..N (and matching ids) in current order.
pub fn rerank(mut items: Vec<NewsItem>) -> Vec<NewsItem> {
    for (i, item) in items.iter_mut().enumerate() {
        let rank = u32::try_from(i + 1).unwrap_or(u32::MAX);
        item.rank = rank;
        item.id = format!("news-{rank}");
    }
    items
}

/// Splice backup items in when the merged list is below `min_items`.
///
/// # Arguments
///
/// * `items` - The merged, ranked list
/// * `backup` - Configured backup entries, in splice order
/// * `date` - Document date, formatted into titles carrying `{date}`
/// * `min_items` - Floor below which padding kicks in
/// * `max_backup` - Most backup entries that may be added
/// * `max_items` - Hard cap on the resulting list
///
/// # Returns
///
/// The re-ranked list and how many backup items were added. Entries whose
/// fingerprint is already present are skipped.
pub fn pad_with_backup(
    items: Vec<NewsItem>,
    backup: &[BackupNews],
    date: NaiveDate,
    min_items: usize,
    max_backup: usize,
    max_items: usize,
) -> (Vec<NewsItem>, usize) {
    if items.len() >= min_items {
        return (items, 0);
    }

    let mut items = items;
    let mut added = 0;
    for b in backup {
        if added >= max_backup || items.len() >= max_items {
            break;
        }
        let title = backup_title(&b.title, date);
        let key = dedup_key(&title);
        if items.iter().any(|n| dedup_key(&n.title) == key) {
            continue;
        }
        items.push(NewsItem {
            id: String::new(),
            rank: 0,
            title,
            keywords: b.keywords.clone(),
            highlight: b.highlight.clone(),
            url: b.url.clone(),
            source: BACKUP_SOURCE.to_string(),
            image: None,
            publish_time: None,
        });
        added += 1;
    }

    (rerank(items), added)
}

/// Pick the day's keywords from the news tags.
///
/// # Arguments
///
/// * `news` - The final, ranked news list
/// * `n` - How many keywords to keep
///
/// # Returns
///
/// Up to `n` tags ordered by how many items carry them. Ties keep the order
/// in which the tags were first seen walking the list by rank.
pub fn derive_keywords(news: &[NewsItem], n: usize) -> Vec<String> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for kw in news.iter().flat_map(|item| item.keywords.iter()) {
        match index.get(kw) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(kw.clone(), order.len());
                order.push((kw.clone(), 1));
            }
        }
    }

    // sort_by is stable, so equal counts stay in first-seen order
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.into_iter().take(n).map(|(kw, _)| kw).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn raw(title: &str, source: &str, tags: &[&str]) -> RawNews {
        RawNews {
            title: title.to_string(),
            summary: format!("about {title}"),
            url: Some("https://example.com/a".to_string()),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            source: source.to_string(),
            image: None,
            publish_time: None,
        }
    }

    fn feb27() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 27).unwrap()
    }

    fn assert_contiguous(items: &[NewsItem]) {
        let ranks = items.iter().map(|n| n.rank).collect::<Vec<_>>();
        let expected = (1..=items.len() as u32).collect::<Vec<_>>();
        assert_eq!(ranks, expected);
    }

    #[test]
    fn test_dedup_key_is_case_insensitive_prefix() {
        assert_eq!(
            dedup_key("OpenAI Releases GPT-5 To Everyone Today"),
            dedup_key("openai releases gpt-5 to all users")
        );
        assert_eq!(dedup_key("  Short  "), "short");
        assert_eq!(dedup_key("英伟达发布新一代Blackwell架构GPU芯片，算力提升五倍以上").chars().count(), 20);
    }

    #[test]
    fn test_merge_priority_and_first_wins() {
        let primary = vec![raw("OpenAI Releases GPT-5 To Everyone", "36Kr", &["AI"])];
        let secondary = vec![
            raw("openai releases gpt-5 to everyone!!", "Zhihu", &["GPT"]),
            raw("NVIDIA earnings beat", "Zhihu", &["NVIDIA"]),
        ];

        let merged = merge(&[primary, secondary], 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, "36Kr");
        assert_eq!(merged[1].title, "NVIDIA earnings beat");
        assert_eq!(merged[1].id, "news-2");
        assert_contiguous(&merged);
    }

    #[test]
    fn test_merge_caps_at_max_items() {
        let list = (0..15)
            .map(|i| raw(&format!("Distinct story number {i:02}"), "ITHome", &[]))
            .collect::<Vec<_>>();
        let merged = merge(&[list], 10);
        assert_eq!(merged.len(), 10);
        assert_contiguous(&merged);
    }

    #[test]
    fn test_merge_is_idempotent_under_self_concatenation() {
        let list = vec![
            raw("Story A about models", "36Kr", &["AI"]),
            raw("Story B about chips", "36Kr", &["芯片"]),
            raw("Story C about robots", "ITHome", &["机器人"]),
        ];
        let once = merge(&[list.clone()], 10);
        let doubled = list.iter().chain(list.iter()).cloned().collect::<Vec<_>>();
        assert_eq!(merge(&[doubled], 10), once);
        assert_eq!(merge(&[list.clone(), list], 10), once);
    }

    #[test]
    fn test_ranks_ignore_upstream_order_and_stay_contiguous() {
        let lists = vec![
            vec![raw("A one", "36Kr", &[]), raw("A one", "36Kr", &[])],
            vec![],
            vec![raw("B two", "Zhihu", &[]), raw("C three", "ITHome", &[])],
        ];
        let merged = merge(&lists, 10);
        assert_eq!(merged.len(), 3);
        assert_contiguous(&merged);
    }

    #[test]
    fn test_padding_from_empty_fetchers() {
        let config = PipelineConfig::builtin().unwrap();
        let merged = merge(&[vec![], vec![], vec![]], 10);
        let (padded, added) = pad_with_backup(
            merged,
            &config.news.backup,
            feb27(),
            config.news.min_items,
            config.news.max_backup_items,
            config.news.max_items,
        );
        assert_eq!(added, 2);
        assert_eq!(padded.len(), 2);
        assert!(padded.iter().all(|n| n.source == BACKUP_SOURCE));
        assert_eq!(padded[0].title, "2月27日 AI行业热点回顾");
        assert_contiguous(&padded);
    }

    #[test]
    fn test_backup_title_without_placeholder_is_unchanged() {
        assert_eq!(backup_title("国内大模型最新进展", feb27()), "国内大模型最新进展");
        assert_eq!(
            backup_title("{date} 回顾", NaiveDate::from_ymd_opt(2026, 12, 3).unwrap()),
            "12月3日 回顾"
        );
    }

    #[test]
    fn test_padding_skips_when_enough_items() {
        let config = PipelineConfig::builtin().unwrap();
        let list = (0..5)
            .map(|i| raw(&format!("Enough story {i}"), "36Kr", &[]))
            .collect::<Vec<_>>();
        let merged = merge(&[list], 10);
        let (padded, added) = pad_with_backup(merged.clone(), &config.news.backup, feb27(), 5, 2, 10);
        assert_eq!(added, 0);
        assert_eq!(padded, merged);
    }

    #[test]
    fn test_padding_skips_duplicate_backup_titles() {
        let config = PipelineConfig::builtin().unwrap();
        let stamped = backup_title(&config.news.backup[0].title, feb27());
        let existing = merge(&[vec![raw(&stamped, "36Kr", &[])]], 10);
        let (padded, added) = pad_with_backup(existing, &config.news.backup, feb27(), 5, 2, 10);
        assert_eq!(added, 1);
        assert_eq!(padded.len(), 2);
        assert_eq!(padded[0].source, "36Kr");
    }

    #[test]
    fn test_derive_keywords_by_frequency_then_first_seen() {
        let news = merge(
            &[vec![
                raw("one", "s", &["AI", "芯片"]),
                raw("two", "s", &["机器人", "AI"]),
                raw("three", "s", &["芯片", "GPU"]),
                raw("four", "s", &["Agent", "AI"]),
                raw("five", "s", &["算力"]),
            ]],
            10,
        );
        assert_eq!(
            derive_keywords(&news, 5),
            vec!["AI", "芯片", "机器人", "GPU", "Agent"]
        );
        assert_eq!(derive_keywords(&news, 1), vec!["AI"]);
        assert!(derive_keywords(&[], 5).is_empty());
    }
}
