//! Fallback resolver: pick the best available document for "today".
//!
//! Tiers are tried in order and the first hit wins:
//!
//! 1. today's document
//! 2. yesterday's document
//! 3. each of the 2..=7 days before today, nearest first
//! 4. the static document compiled into the binary
//!
//! Only the first tier counts as fresh.

use crate::error::PipelineError;
use crate::models::DailyDocument;
use crate::utils::days_before;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

const STATIC_JSON: &str = include_str!("../static/daily-push.json");

/// Furthest day offset the history walk reaches.
pub const HISTORY_DAYS: u64 = 7;

static STATIC_DOCUMENT: Lazy<Option<DailyDocument>> =
    Lazy::new(|| match serde_json::from_str(STATIC_JSON) {
        Ok(doc) => Some(doc),
        Err(e) => {
            error!(error = %e, "Embedded static document does not parse");
            None
        }
    });

/// The hand-authored document embedded at build time.
pub fn static_document() -> Option<&'static DailyDocument> {
    STATIC_DOCUMENT.as_ref()
}

/// Anything that can hand back the stored document for a date.
///
/// Absent and unreadable documents both come back as `None`.
/// The returned future is `Send` so resolution can run inside spawned tasks.
pub trait DocumentSource: Sync {
    fn load(&self, date: NaiveDate) -> impl Future<Output = Option<DailyDocument>> + Send;
}

/// Which tier produced a resolved document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTier {
    Today,
    Yesterday,
    History(NaiveDate),
    Static,
}

impl SourceTier {
    /// Label written to the status record's `source` field.
    pub fn label(&self) -> String {
        match self {
            SourceTier::Today => "today".to_string(),
            SourceTier::Yesterday => "yesterday".to_string(),
            SourceTier::History(date) => format!("history-{date}"),
            SourceTier::Static => "static".to_string(),
        }
    }

    /// `_source` annotation on the HTTP response.
    pub fn origin(&self) -> &'static str {
        match self {
            SourceTier::Static => "static",
            _ => "json",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub document: DailyDocument,
    pub tier: SourceTier,
    pub is_fresh: bool,
}

/// Walk the tiers for `today`.
///
/// # Errors
///
/// [`PipelineError::ExhaustedFallback`] when no stored document exists in the
/// window and `static_doc` is `None`.
#[instrument(level = "info", skip_all, fields(%today))]
pub async fn resolve<S: DocumentSource>(
    source: &S,
    today: NaiveDate,
    static_doc: Option<&DailyDocument>,
) -> Result<Resolved, PipelineError> {
    for offset in 0..=HISTORY_DAYS {
        let date = days_before(today, offset);
        let Some(document) = source.load(date).await else {
            debug!(%date, "No usable document");
            continue;
        };

        let tier = match offset {
            0 => SourceTier::Today,
            1 => SourceTier::Yesterday,
            _ => SourceTier::History(date),
        };
        if offset > 0 {
            warn!(%tier, "Serving a previous day's document");
        } else {
            info!("Serving today's document");
        }
        return Ok(Resolved {
            document,
            tier,
            is_fresh: offset == 0,
        });
    }

    match static_doc {
        Some(doc) => {
            warn!(
                days = HISTORY_DAYS,
                "No stored document in window; serving static document"
            );
            Ok(Resolved {
                document: doc.clone(),
                tier: SourceTier::Static,
                is_fresh: false,
            })
        }
        None => {
            error!("Every fallback tier is exhausted");
            Err(PipelineError::ExhaustedFallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSource {
        docs: HashMap<NaiveDate, DailyDocument>,
        calls: Mutex<Vec<NaiveDate>>,
    }

    impl RecordingSource {
        fn with(dates: &[NaiveDate]) -> Self {
            let docs = dates.iter().map(|d| (*d, doc_for(*d))).collect();
            RecordingSource {
                docs,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<NaiveDate> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl DocumentSource for RecordingSource {
        fn load(&self, date: NaiveDate) -> impl Future<Output = Option<DailyDocument>> + Send {
            self.calls.lock().unwrap().push(date);
            let doc = self.docs.get(&date).cloned();
            async move { doc }
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn doc_for(d: NaiveDate) -> DailyDocument {
        let mut doc = static_document().unwrap().clone();
        doc.date = d;
        doc
    }

    #[test]
    fn test_static_document_is_embedded() {
        let doc = static_document().expect("static document parses");
        assert!(doc.news.len() >= 5);
        assert!(!doc.keywords.is_empty());
    }

    #[tokio::test]
    async fn test_today_is_fresh() {
        let today = date("2026-02-27");
        let source = RecordingSource::with(&[today, date("2026-02-26")]);
        let resolved = resolve(&source, today, static_document()).await.unwrap();
        assert_eq!(resolved.tier, SourceTier::Today);
        assert!(resolved.is_fresh);
        assert_eq!(source.calls(), vec![today]);
    }

    #[tokio::test]
    async fn test_yesterday_stops_the_walk() {
        let today = date("2026-02-27");
        let yesterday = date("2026-02-26");
        let source = RecordingSource::with(&[yesterday, date("2026-02-24")]);

        let resolved = resolve(&source, today, static_document()).await.unwrap();
        assert_eq!(resolved.tier, SourceTier::Yesterday);
        assert!(!resolved.is_fresh);
        assert_eq!(resolved.document.date, yesterday);
        assert_eq!(source.calls(), vec![today, yesterday]);
    }

    #[tokio::test]
    async fn test_history_walk_nearest_first() {
        let today = date("2026-03-02");
        let source = RecordingSource::with(&[date("2026-02-25"), date("2026-02-27")]);

        let resolved = resolve(&source, today, static_document()).await.unwrap();
        assert_eq!(resolved.tier, SourceTier::History(date("2026-02-27")));
        assert_eq!(resolved.tier.label(), "history-2026-02-27");
        assert_eq!(resolved.tier.origin(), "json");
        assert_eq!(source.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_document_older_than_window_is_ignored() {
        let today = date("2026-02-27");
        let source = RecordingSource::with(&[date("2026-02-19")]);

        let resolved = resolve(&source, today, static_document()).await.unwrap();
        assert_eq!(resolved.tier, SourceTier::Static);
        assert_eq!(resolved.tier.origin(), "static");
        assert!(!resolved.is_fresh);
        assert_eq!(source.calls().len(), 8);
    }

    #[tokio::test]
    async fn test_exhausted_without_static() {
        let source = RecordingSource::default();
        let err = resolve(&source, date("2026-02-27"), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::ExhaustedFallback));
    }
}
