//! Error type shared by the pipeline, the store and the serving layer.
//!
//! Most failures in this crate are recovered close to where they happen:
//! fetchers swallow their own errors, the validator returns advisory notes,
//! and store reads collapse to "absent". What remains here is the short list
//! of things a caller can actually observe.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Every tier (today, yesterday, the 7-day walk and the static document)
    /// came up empty.
    #[error("no document available in any fallback tier")]
    ExhaustedFallback,
}
