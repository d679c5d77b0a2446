//! Zhihu hot list.

use super::{RawFetcher, extract_tags, is_relevant};
use crate::config::NewsConfig;
use crate::error::PipelineError;
use crate::models::{RawBatch, RawNews};
use crate::utils::char_prefix;
use chrono::NaiveDate;
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{info, instrument, warn};

const LABEL: &str = "Zhihu";
const MAX_ITEMS: usize = 8;

#[derive(Debug, Deserialize)]
struct HotList {
    #[serde(default)]
    data: Vec<HotEntry>,
}

#[derive(Debug, Deserialize)]
struct HotEntry {
    target: Option<Target>,
}

#[derive(Debug, Deserialize)]
struct Target {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    title: String,
    #[serde(default)]
    excerpt: String,
}

#[derive(Debug, Clone)]
pub struct ZhihuHot {
    url: String,
    client: reqwest::Client,
    rules: NewsConfig,
}

impl ZhihuHot {
    pub fn new(url: &str, client: reqwest::Client, rules: NewsConfig) -> Self {
        ZhihuHot {
            url: url.to_string(),
            client,
            rules,
        }
    }

    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn try_fetch(&self) -> Result<Vec<RawNews>, PipelineError> {
        let list: HotList = self
            .client
            .get(&self.url)
            .header(reqwest::header::REFERER, "https://www.zhihu.com/")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let items = list
            .data
            .into_iter()
            .filter_map(|entry| entry.target)
            .filter_map(|t| to_news(t, &self.rules))
            .take(MAX_ITEMS)
            .collect::<Vec<_>>();
        info!(count = items.len(), "Parsed relevant hot-list entries");
        Ok(items)
    }
}

fn to_news(target: Target, rules: &NewsConfig) -> Option<RawNews> {
    let title = target.title.trim();
    let excerpt = target.excerpt.trim();
    let haystack = format!("{title} {excerpt}");
    if title.is_empty() || !is_relevant(&haystack, &rules.relevance_terms) {
        return None;
    }
    let id = match &target.id {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };

    Some(RawNews {
        title: char_prefix(title, 100),
        summary: char_prefix(excerpt, 200),
        url: Some(format!("https://www.zhihu.com/question/{id}")),
        tags: extract_tags(&haystack, &rules.tag_rules),
        source: LABEL.to_string(),
        image: None,
        publish_time: None,
    })
}

impl RawFetcher for ZhihuHot {
    fn name(&self) -> &str {
        LABEL
    }

    fn fetch(&self, _date: NaiveDate) -> BoxFuture<'_, RawBatch> {
        Box::pin(async move {
            match self.try_fetch().await {
                Ok(items) => RawBatch::News(items),
                Err(e) => {
                    warn!(source = LABEL, error = %e, "Zhihu fetch failed");
                    RawBatch::News(Vec::new())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(uri: &str) -> ZhihuHot {
        ZhihuHot::new(
            uri,
            reqwest::Client::new(),
            PipelineConfig::builtin().unwrap().news,
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 27).unwrap()
    }

    #[tokio::test]
    async fn test_relevant_entries_become_questions() {
        let server = MockServer::start().await;
        let body = json!({
            "data": [
                {"target": {"id": 640001, "title": "如何评价最新发布的国产大模型？", "excerpt": "长上下文"}},
                {"target": {"id": 640002, "title": "周末去哪里爬山", "excerpt": ""}},
                {"target": {"id": "640003", "title": "人形机器人离量产还有多远", "excerpt": "具身智能"}},
                {"detail_text": "no target here"}
            ]
        });
        Mock::given(method("GET"))
            .and(header("referer", "https://www.zhihu.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let RawBatch::News(items) = fetcher(&server.uri()).fetch(date()).await else {
            panic!("expected a news batch");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].url.as_deref(),
            Some("https://www.zhihu.com/question/640001")
        );
        assert_eq!(
            items[1].url.as_deref(),
            Some("https://www.zhihu.com/question/640003")
        );
        assert!(items[1].tags.contains(&"机器人".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_body_yields_empty_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let batch = fetcher(&server.uri()).fetch(date()).await;
        assert!(batch.is_empty());
    }
}
