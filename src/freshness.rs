//! Freshness gate and the health report built on top of it.
//!
//! The gate answers "is today's data current?" from the status record alone
//! (plus whether today's document file exists), without scanning the document
//! directory.

use crate::models::{Freshness, SyncStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// Verdict of the freshness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessState {
    /// Status is for today, successful, and younger than the threshold.
    Fresh,
    /// Status is for today but too old, or today's run fell back.
    StaleSameDay,
    /// Status belongs to another calendar date.
    StaleWrongDate,
    /// No status record, or the status points at a document that is gone.
    Missing,
}

impl FreshnessState {
    pub fn is_fresh(self) -> bool {
        self == FreshnessState::Fresh
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FreshnessState::Fresh => "FRESH",
            FreshnessState::StaleSameDay => "STALE_SAME_DAY",
            FreshnessState::StaleWrongDate => "STALE_WRONG_DATE",
            FreshnessState::Missing => "MISSING",
        }
    }
}

impl fmt::Display for FreshnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluate the gate.
///
/// `document_present` tells whether a document file for `today` can be read.
/// A status that reports a fallback (`is_fresh == false`) never counts as
/// fresh even when it is recent.
pub fn evaluate(
    status: Option<&SyncStatus>,
    document_present: bool,
    today: NaiveDate,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> FreshnessState {
    let Some(status) = status else {
        return FreshnessState::Missing;
    };
    if status.date != today {
        return FreshnessState::StaleWrongDate;
    }
    if !document_present {
        return FreshnessState::Missing;
    }
    if status.success && status.is_fresh && now - status.timestamp < threshold {
        FreshnessState::Fresh
    } else {
        FreshnessState::StaleSameDay
    }
}

/// Label a document by its age: fresh below half the threshold, warning
/// below the threshold, stale from there on.
pub fn classify_age(age: chrono::Duration, threshold: chrono::Duration) -> Freshness {
    if age < threshold / 2 {
        Freshness::Fresh
    } else if age < threshold {
        Freshness::Warning
    } else {
        Freshness::Stale
    }
}

/// Body of `GET /api/health`, also printed by the `health` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub is_fresh: bool,
    /// RFC 3339 timestamp of the last attempt, or `"unknown"`.
    pub last_updated: String,
    pub needs_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_since_sync: Option<f64>,
    pub message: String,
}

impl HealthReport {
    pub fn new(
        state: FreshnessState,
        status: Option<&SyncStatus>,
        now: DateTime<Utc>,
        threshold: chrono::Duration,
    ) -> Self {
        let Some(status) = status else {
            return HealthReport {
                is_fresh: false,
                last_updated: "unknown".to_string(),
                needs_update: true,
                date: None,
                source: None,
                hours_since_sync: None,
                message: "sync status not found".to_string(),
            };
        };

        let hours = hours_between(status.timestamp, now);
        let message = match state {
            FreshnessState::Fresh => "data is fresh".to_string(),
            FreshnessState::StaleSameDay => match &status.error {
                Some(e) => format!("today's sync fell back to {}: {e}", status.source),
                None => format!(
                    "data is {hours:.1}h old (threshold {}h)",
                    threshold.num_hours()
                ),
            },
            FreshnessState::StaleWrongDate => {
                format!("data is for {}, a new sync is needed", status.date)
            }
            FreshnessState::Missing => {
                format!("document for {} is missing", status.date)
            }
        };

        HealthReport {
            is_fresh: state.is_fresh(),
            last_updated: status.timestamp.to_rfc3339(),
            needs_update: !state.is_fresh(),
            date: Some(status.date),
            source: Some(status.source.clone()),
            hours_since_sync: Some(hours),
            message,
        }
    }
}

/// Hours from `then` to `now`, rounded to one decimal.
#[allow(clippy::cast_precision_loss)]
fn hours_between(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - then).num_seconds() as f64;
    (secs / 3600.0 * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 27).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 27, 23, 30, 0).unwrap()
    }

    fn status(date: NaiveDate, timestamp: DateTime<Utc>) -> SyncStatus {
        SyncStatus {
            success: true,
            date,
            source: "today".to_string(),
            is_fresh: true,
            timestamp,
            error: None,
        }
    }

    #[test]
    fn test_threshold_boundary() {
        let threshold = Duration::hours(25);
        let just_inside = status(today(), now() - Duration::minutes(24 * 60 + 59));
        let just_outside = status(today(), now() - Duration::minutes(25 * 60 + 1));

        assert_eq!(
            evaluate(Some(&just_inside), true, today(), now(), threshold),
            FreshnessState::Fresh
        );
        assert_eq!(
            evaluate(Some(&just_outside), true, today(), now(), threshold),
            FreshnessState::StaleSameDay
        );
    }

    #[test]
    fn test_previous_date_is_wrong_date() {
        let yesterday = NaiveDate::from_ymd_opt(2026, 2, 26).unwrap();
        let s = status(yesterday, now() - Duration::hours(1));
        assert_eq!(
            evaluate(Some(&s), false, today(), now(), Duration::hours(25)),
            FreshnessState::StaleWrongDate
        );
    }

    #[test]
    fn test_missing_status_or_document() {
        assert_eq!(
            evaluate(None, true, today(), now(), Duration::hours(25)),
            FreshnessState::Missing
        );
        let s = status(today(), now());
        assert_eq!(
            evaluate(Some(&s), false, today(), now(), Duration::hours(25)),
            FreshnessState::Missing
        );
    }

    #[test]
    fn test_fallback_status_is_not_fresh() {
        let mut s = status(today(), now() - Duration::minutes(5));
        s.success = false;
        s.is_fresh = false;
        s.source = "yesterday".to_string();
        assert_eq!(
            evaluate(Some(&s), true, today(), now(), Duration::hours(25)),
            FreshnessState::StaleSameDay
        );
    }

    #[test]
    fn test_classify_age_bands() {
        let t = Duration::hours(24);
        assert_eq!(classify_age(Duration::hours(1), t), Freshness::Fresh);
        assert_eq!(classify_age(Duration::hours(12), t), Freshness::Warning);
        assert_eq!(classify_age(Duration::hours(23), t), Freshness::Warning);
        assert_eq!(classify_age(Duration::hours(24), t), Freshness::Stale);
        assert_eq!(classify_age(Duration::minutes(-3), t), Freshness::Fresh);
    }

    #[test]
    fn test_health_without_status() {
        let state = evaluate(None, false, today(), now(), Duration::hours(25));
        let report = HealthReport::new(state, None, now(), Duration::hours(25));
        assert!(report.needs_update);
        assert!(!report.is_fresh);
        assert_eq!(report.last_updated, "unknown");
        assert_eq!(report.message, "sync status not found");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["needsUpdate"], true);
        assert!(json.get("hoursSinceSync").is_none());
    }

    #[test]
    fn test_health_rounds_hours() {
        let s = status(today(), now() - Duration::minutes(90) - Duration::seconds(20));
        let state = evaluate(Some(&s), true, today(), now(), Duration::hours(25));
        let report = HealthReport::new(state, Some(&s), now(), Duration::hours(25));
        assert!(report.is_fresh);
        assert!(!report.needs_update);
        assert_eq!(report.hours_since_sync, Some(1.5));
        assert_eq!(report.source.as_deref(), Some("today"));
    }
}
