//! On-disk document store.
//!
//! # Layout
//!
//! ```text
//! output_dir/
//! ├── daily-push-2026-02-26.json
//! ├── daily-push-2026-02-27.json
//! └── sync-status.json
//! ```
//!
//! One file per date plus a single status record. Every write replaces the
//! whole file through a temp-file rename. Reads never fail: a missing,
//! unparsable or mislabelled file is reported as absent.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fallback::DocumentSource;
use crate::models::{DailyDocument, SyncStatus};
use crate::utils::{looks_truncated, write_atomic};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
    prefix: String,
    status_path: PathBuf,
    snapshot_path: PathBuf,
}

impl DocumentStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        status_path: impl Into<PathBuf>,
        snapshot_path: impl Into<PathBuf>,
    ) -> Self {
        DocumentStore {
            dir: dir.into(),
            prefix: prefix.into(),
            status_path: status_path.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            &config.output_dir,
            &config.file_prefix,
            config.status_path(),
            &config.snapshot_file,
        )
    }

    /// `{dir}/{prefix}-{YYYY-MM-DD}.json`
    pub fn document_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}-{}.json", self.prefix, date))
    }

    /// Persist `doc` under its own date, replacing any previous file for it.
    #[instrument(level = "info", skip_all, fields(date = %doc.date))]
    pub async fn write(&self, doc: &DailyDocument) -> Result<PathBuf, PipelineError> {
        let path = self.document_path(doc.date);
        let json = serde_json::to_string_pretty(doc)?;
        write_atomic(&path, json.as_bytes()).await?;
        info!(path = %path.display(), news = doc.news.len(), "Wrote document");
        Ok(path)
    }

    /// The stored document for `date`, if one exists and is intact.
    #[instrument(level = "debug", skip_all, fields(%date))]
    pub async fn read(&self, date: NaiveDate) -> Option<DailyDocument> {
        let path = self.document_path(date);
        let doc: DailyDocument = read_json(&path).await?;
        if doc.date != date {
            warn!(
                path = %path.display(),
                content_date = %doc.date,
                "Document date does not match its file name; ignoring"
            );
            return None;
        }
        Some(doc)
    }

    #[instrument(level = "info", skip_all, fields(source = %status.source, success = status.success))]
    pub async fn write_status(&self, status: &SyncStatus) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(status)?;
        write_atomic(&self.status_path, json.as_bytes()).await?;
        info!(path = %self.status_path.display(), "Wrote sync status");
        Ok(())
    }

    pub async fn read_status(&self) -> Option<SyncStatus> {
        read_json(&self.status_path).await
    }

    /// Re-export `doc` as the static snapshot embedded by the next build.
    #[instrument(level = "info", skip_all, fields(date = %doc.date))]
    pub async fn export_snapshot(&self, doc: &DailyDocument) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(doc)?;
        write_atomic(&self.snapshot_path, json.as_bytes()).await?;
        info!(path = %self.snapshot_path.display(), "Exported static snapshot");
        Ok(())
    }
}

impl DocumentSource for DocumentStore {
    fn load(&self, date: NaiveDate) -> impl Future<Output = Option<DailyDocument>> + Send {
        self.read(date)
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "File not found");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read file");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) if looks_truncated(&e) => {
            warn!(path = %path.display(), error = %e, "File is truncated; treating as absent");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "File is corrupt; treating as absent");
            None
        }
    }
}
