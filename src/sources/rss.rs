//! RSS news feeds (36Kr, ITHome).
//!
//! Items are parsed with quick-xml, descriptions are stripped of markup, and
//! only AI/tech related items are kept.

use super::{RawFetcher, extract_tags, is_relevant, strip_html};
use crate::config::NewsConfig;
use crate::error::PipelineError;
use crate::models::{RawBatch, RawNews};
use crate::utils::{char_prefix, truncate_for_log};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, info, instrument, warn};

const MAX_ITEMS: usize = 10;
const MAX_TITLE_CHARS: usize = 100;
const MAX_SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct RssFeed {
    label: String,
    url: String,
    client: reqwest::Client,
    rules: NewsConfig,
}

impl RssFeed {
    pub fn new(label: &str, url: &str, client: reqwest::Client, rules: NewsConfig) -> Self {
        RssFeed {
            label: label.to_string(),
            url: url.to_string(),
            client,
            rules,
        }
    }

    #[instrument(level = "info", skip_all, fields(source = %self.label, url = %self.url))]
    async fn try_fetch(&self) -> Result<Vec<RawNews>, PipelineError> {
        let xml = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(bytes = xml.len(), "Downloaded feed");
        let items = parse_feed(&xml, &self.label, &self.rules, MAX_ITEMS).inspect_err(|e| {
            warn!(error = %e, head = %truncate_for_log(&xml, 200), "Feed is not well-formed XML");
        })?;
        info!(count = items.len(), "Parsed relevant feed items");
        Ok(items)
    }
}

impl RawFetcher for RssFeed {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch(&self, _date: NaiveDate) -> BoxFuture<'_, RawBatch> {
        Box::pin(async move {
            match self.try_fetch().await {
                Ok(items) => RawBatch::News(items),
                Err(e) => {
                    warn!(source = %self.label, error = %e, "RSS fetch failed");
                    RawBatch::News(Vec::new())
                }
            }
        })
    }
}

#[derive(Default)]
struct ItemFields {
    title: String,
    link: String,
    description: String,
    pub_date: String,
}

/// Parse `<item>` elements of an RSS document into news entries.
///
/// Stops after `max_items` relevant items.
pub fn parse_feed(
    xml: &str,
    label: &str,
    rules: &NewsConfig,
    max_items: usize,
) -> Result<Vec<RawNews>, PipelineError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut in_item = false;
    let mut current_tag = String::new();
    let mut fields = ItemFields::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    in_item = true;
                    fields = ItemFields::default();
                }
                current_tag = name;
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if name.as_ref() == b"item" && in_item {
                    in_item = false;
                    if let Some(news) = to_news(&fields, label, rules) {
                        items.push(news);
                        if items.len() >= max_items {
                            break;
                        }
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Text(e)) => {
                if in_item {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    append_field(&mut fields, &current_tag, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if in_item {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    append_field(&mut fields, &current_tag, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PipelineError::Xml(e)),
            _ => {}
        }
    }

    Ok(items)
}

fn append_field(fields: &mut ItemFields, tag: &str, text: &str) {
    let target = match tag {
        "title" => &mut fields.title,
        "link" => &mut fields.link,
        "description" => &mut fields.description,
        "pubDate" => &mut fields.pub_date,
        _ => return,
    };
    target.push_str(text);
}

fn to_news(fields: &ItemFields, label: &str, rules: &NewsConfig) -> Option<RawNews> {
    let title = fields.title.trim();
    if title.is_empty() {
        return None;
    }
    let description = strip_html(&fields.description);
    let haystack = format!("{title} {description}");
    if !is_relevant(&haystack, &rules.relevance_terms) {
        return None;
    }

    let link = fields.link.trim();
    Some(RawNews {
        title: char_prefix(title, MAX_TITLE_CHARS),
        summary: char_prefix(&description, MAX_SUMMARY_CHARS),
        url: (!link.is_empty()).then(|| link.to_string()),
        tags: extract_tags(&haystack, &rules.tag_rules),
        source: label.to_string(),
        image: None,
        publish_time: (!fields.pub_date.trim().is_empty())
            .then(|| fields.pub_date.trim().to_string()),
    })
}
