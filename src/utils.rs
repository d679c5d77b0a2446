//! Utility functions for dates, string handling, prices and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Calendar helpers for "today" and the backward day walk
//! - String truncation for logging and title-prefix fingerprints
//! - Price formatting and currency conversion
//! - JSON error detection for partially written files
//! - File system validation and atomic whole-file writes

use crate::error::PipelineError;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

/// Today's calendar date in the local timezone.
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse a `YYYY-MM-DD` string into a calendar date.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDate`] for anything that is not a real
/// calendar date in that exact format.
pub fn parse_date(s: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| PipelineError::InvalidDate(s.to_string()))
}

/// The date `days` calendar days before `date`.
pub fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(chrono::Days::new(days))
        .unwrap_or(NaiveDate::MIN)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and byte count
/// indicator appended. Cuts on a character boundary, so CJK titles are safe.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// The first `n` characters of `s`.
pub fn char_prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A document file cut short by an interrupted write fails with an EOF
/// error; the store logs those differently from other parse failures.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Format an integer amount with thousands separators.
///
/// # Arguments
///
/// * `amount` - A whole-yuan price
///
/// # Returns
///
/// The digits grouped in threes with commas, e.g. `3850` becomes `3,850`
/// and `999` is left as is.
pub fn format_thousands(amount: u32) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Convert a native-currency amount into CNY.
///
/// # Arguments
///
/// * `amount` - Price in the listing's own currency (JPY, HKD, ...)
/// * `rate` - CNY per unit of that currency, from the config's rate table
///
/// # Returns
///
/// The price in yuan, rounded to the nearest whole yuan. A negative rate
/// clamps to zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn convert_price(amount: u32, rate: f64) -> u32 {
    (f64::from(amount) * rate).round().max(0.0) as u32
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a marker file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).await?;
    let marker_path = path.join("..__write_check__");
    fs::write(&marker_path, b"").await?;
    let _ = fs::remove_file(&marker_path).await;
    info!("Output directory is writable");
    Ok(())
}

/// Replace `path` with `bytes` in one step.
///
/// Writes a sibling `.tmp` file and renames it over the target, so a reader
/// sees either the previous file or the complete new one, never a prefix.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, bytes).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    debug!(bytes = bytes.len(), "Atomic write complete");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
