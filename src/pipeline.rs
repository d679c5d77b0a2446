//! The generation run, sync with retries, and the serving read.
//!
//! A generation run goes through these stages in order:
//! 1. **Fetching**: every source runs concurrently and all of them settle
//! 2. **Validation**: each batch is checked and corrected on its own
//! 3. **Merging**: news lists are merged in priority order and padded from backup
//! 4. **Correction and scoring**: derived fields are filled, confidence computed
//! 5. **Persistence**: the document is written under its date
//!
//! `sync` wraps a run for "today" with the retry queue and records the outcome
//! in the status record. Reads go through the freshness gate and the fallback
//! resolver and never fail unless even the static document is unavailable.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fallback::{DocumentSource, Resolved, SourceTier, resolve, static_document};
use crate::freshness::{FreshnessState, HealthReport, evaluate};
use crate::merger::{derive_keywords, merge, pad_with_backup};
use crate::models::{
    DailyDocument, DataQuality, Freshness, NintendoDeals, RawBatch, SyncStatus,
};
use crate::retry::{RetryOutcome, RetryPolicy, RetryQueue};
use crate::scorer::score;
use crate::sources::{RawFetcher, default_fetchers, fetch_all, http_client};
use crate::store::DocumentStore;
use crate::utils::today_local;
use crate::validator::{correct_document, validate};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// A freshly written document.
#[derive(Debug, Clone)]
pub struct Generated {
    pub document: DailyDocument,
    pub path: PathBuf,
}

/// How a sync ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The gate reported FRESH and the sync was not forced.
    AlreadyFresh,
    Generated { date: NaiveDate, attempts: u32 },
    Failed {
        date: NaiveDate,
        attempts: u32,
        error: String,
        /// Tier serving in place of today's document, if any.
        fallback: Option<SourceTier>,
        /// A newer run cancelled or replaced this one's pending retry.
        superseded: bool,
    },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SyncOutcome::Failed { .. })
    }
}

/// Result of [`Pipeline::health_check`].
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Verdict before any repair was attempted.
    pub report: HealthReport,
    /// The forced sync run to repair unhealthy data, when auto-fix was on.
    pub fix: Option<SyncOutcome>,
}

impl HealthCheck {
    /// Healthy when the data was fresh or the repair succeeded.
    pub fn is_healthy(&self) -> bool {
        match &self.fix {
            Some(outcome) => outcome.is_success(),
            None => self.report.is_fresh,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    store: DocumentStore,
    fetchers: Vec<Box<dyn RawFetcher>>,
    retry: RetryQueue,
    /// Held for the whole of a sync, retries included. One run at a time.
    run_lock: Mutex<()>,
}

/// Today's document as already read, with earlier days from the store.
struct TodayPreloaded<'a> {
    store: &'a DocumentStore,
    today: NaiveDate,
    document: Option<DailyDocument>,
}

impl DocumentSource for TodayPreloaded<'_> {
    fn load(&self, date: NaiveDate) -> impl Future<Output = Option<DailyDocument>> + Send {
        let preloaded = (date == self.today).then(|| self.document.clone());
        async move {
            match preloaded {
                Some(document) => document,
                None => self.store.read(date).await,
            }
        }
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig, fetchers: Vec<Box<dyn RawFetcher>>) -> Self {
        Pipeline {
            store: DocumentStore::from_config(&config),
            retry: RetryQueue::new(RetryPolicy::from_config(&config)),
            fetchers,
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Build with the live upstream fetchers.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let client = http_client(&config.http)?;
        let fetchers = default_fetchers(&config, &client);
        Ok(Self::new(config, fetchers))
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn retry(&self) -> &RetryQueue {
        &self.retry
    }

    /// Whether a sync (including its retry waits) is running right now.
    pub fn is_syncing(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Fetch, validate, merge, score and persist the document for `date`.
    #[instrument(level = "info", skip_all, fields(%date))]
    pub async fn generate(&self, date: NaiveDate) -> Result<Generated, PipelineError> {
        let t0 = Instant::now();
        let rules = &self.config.news;

        // ---- Fetch ----
        let batches = fetch_all(&self.fetchers, date).await;

        // ---- Validate ----
        let mut news_lists = Vec::new();
        let mut sources = Vec::new();
        let mut draft = empty_draft(date, Utc::now());
        for (name, batch) in &batches {
            let report = validate(batch, rules);
            for note in &report.errors {
                warn!(source = %name, note = %note, "Validation");
            }
            if !report.valid {
                debug!(source = %name, kind = ?batch.kind(), "Batch flagged by validator");
            }
            if !report.corrected.is_empty() {
                sources.push(name.clone());
            }
            match report.corrected {
                RawBatch::News(items) => news_lists.push(items),
                RawBatch::Bandai(items) => draft.bandai.extend(items),
                RawBatch::HotToys(items) => draft.hot_toys.extend(items),
                RawBatch::Steam(items) => draft.steam.extend(items),
                RawBatch::PlayStation(items) => draft.playstation.extend(items),
                RawBatch::Nintendo(n) => draft.nintendo = n,
            }
        }

        // ---- Merge ----
        let merged = merge(&news_lists, rules.max_items);
        let merged_count = merged.len();
        let (news, added) = pad_with_backup(
            merged,
            &rules.backup,
            date,
            rules.min_items,
            rules.max_backup_items,
            rules.max_items,
        );
        if added > 0 {
            warn!(merged = merged_count, backup = added, "News below floor; padded from backup set");
        }
        draft.keywords = derive_keywords(&news, rules.keyword_count);
        draft.news = news;
        draft.data_quality.sources = sources;

        // ---- Correct and score ----
        let corrected = correct_document(
            draft,
            rules,
            Utc::now(),
            self.config.freshness_threshold(),
        );
        for note in &corrected.corrections {
            info!(note = %note, "Correction");
        }
        for note in &corrected.warnings {
            warn!(note = %note, "Document warning");
        }
        let mut document = corrected.document;
        document.data_quality.confidence = score(&document);

        // ---- Persist ----
        let path = self.store.write(&document).await?;
        info!(
            news = document.news.len(),
            confidence = document.data_quality.confidence,
            elapsed_ms = t0.elapsed().as_millis(),
            "Generated document"
        );
        Ok(Generated { document, path })
    }

    /// Generate for `date` and, when `date` is `today`, record it as the
    /// serving document.
    pub async fn generate_for(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Generated, PipelineError> {
        let generated = self.generate(date).await?;
        if date == today {
            self.record_success(&generated.document).await?;
        }
        Ok(generated)
    }

    async fn record_success(&self, document: &DailyDocument) -> Result<(), PipelineError> {
        self.store
            .write_status(&SyncStatus {
                success: true,
                date: document.date,
                source: SourceTier::Today.label(),
                is_fresh: true,
                timestamp: Utc::now(),
                error: None,
            })
            .await?;
        if let Err(e) = self.store.export_snapshot(document).await {
            warn!(error = %e, "Snapshot export failed");
        }
        Ok(())
    }

    /// Record a failed attempt and point the status at the best fallback.
    async fn record_failure(&self, today: NaiveDate, error: &PipelineError) -> Option<SourceTier> {
        let resolved = resolve(&self.store, today, static_document()).await.ok();
        let tier = resolved.as_ref().map(|r| r.tier);
        let status = SyncStatus {
            success: false,
            date: today,
            source: tier.map_or_else(|| "error".to_string(), |t| t.label()),
            is_fresh: false,
            timestamp: Utc::now(),
            error: Some(error.to_string()),
        };
        if let Err(e) = self.store.write_status(&status).await {
            error!(error = %e, "Failed to write sync status");
        }
        if let Some(r) = &resolved {
            if let Err(e) = self.store.export_snapshot(&r.document).await {
                warn!(error = %e, "Snapshot export failed");
            }
        }
        tier
    }

    async fn attempt(&self, today: NaiveDate, attempt: u32) -> Result<(), PipelineError> {
        info!(attempt, "Sync attempt");
        let result = match self.generate(today).await {
            Ok(generated) => self.record_success(&generated.document).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            let tier = self.record_failure(today, e).await;
            warn!(attempt, error = %e, fallback = ?tier, "Sync attempt failed");
        }
        result
    }

    /// Sync "today" in the local timezone.
    pub async fn sync(&self, force: bool) -> SyncOutcome {
        self.sync_for(today_local(), force).await
    }

    /// Regenerate `today` unless the gate says it is already fresh.
    ///
    /// Failed attempts are retried through the queue; between attempts the
    /// pending retry is visible and cancellable. Overlapping calls queue up
    /// behind the one in flight.
    #[instrument(level = "info", skip_all, fields(%today, force))]
    pub async fn sync_for(&self, today: NaiveDate, force: bool) -> SyncOutcome {
        let _run = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Another sync is in flight; waiting for it");
                self.run_lock.lock().await
            }
        };
        self.sync_locked(today, force).await
    }

    async fn sync_locked(&self, today: NaiveDate, force: bool) -> SyncOutcome {
        if !force {
            let (state, _) = self.gate(today, Utc::now()).await;
            if state.is_fresh() {
                info!("Data is fresh; nothing to do");
                return SyncOutcome::AlreadyFresh;
            }
            info!(%state, "Data needs regeneration");
        }

        let this = self;
        let outcome = self
            .retry
            .drive(today, move |attempt| this.attempt(today, attempt))
            .await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => {
                info!(attempts, "Sync succeeded");
                SyncOutcome::Generated {
                    date: today,
                    attempts,
                }
            }
            RetryOutcome::Exhausted { error, attempts } => SyncOutcome::Failed {
                date: today,
                attempts,
                fallback: self.fallback_tier(today).await,
                error: error.to_string(),
                superseded: false,
            },
            RetryOutcome::Superseded { error, attempts } => SyncOutcome::Failed {
                date: today,
                attempts,
                fallback: self.fallback_tier(today).await,
                error: error.to_string(),
                superseded: true,
            },
        }
    }

    async fn fallback_tier(&self, today: NaiveDate) -> Option<SourceTier> {
        resolve(&self.store, today, static_document())
            .await
            .ok()
            .map(|r| r.tier)
    }

    /// Evaluate the freshness gate from the status record.
    pub async fn gate(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> (FreshnessState, Option<SyncStatus>) {
        let status = self.store.read_status().await;
        let present = match &status {
            Some(s) if s.date == today => self.store.read(today).await.is_some(),
            _ => false,
        };
        let state = evaluate(
            status.as_ref(),
            present,
            today,
            now,
            self.config.freshness_threshold(),
        );
        (state, status)
    }

    pub async fn health(&self, today: NaiveDate, now: DateTime<Utc>) -> HealthReport {
        let (state, status) = self.gate(today, now).await;
        HealthReport::new(state, status.as_ref(), now, self.config.freshness_threshold())
    }

    /// Report health and, when `auto_fix` is set and the data is not fresh,
    /// run a forced sync to repair it.
    ///
    /// # Arguments
    ///
    /// * `today` - Date the data should be for
    /// * `now` - Clock used for the age check
    /// * `auto_fix` - Regenerate unhealthy data instead of only reporting it
    ///
    /// # Returns
    ///
    /// The report as it stood before any repair, plus the repair outcome.
    /// Nothing is written when `auto_fix` is off.
    pub async fn health_check(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
        auto_fix: bool,
    ) -> HealthCheck {
        let report = self.health(today, now).await;
        let fix = if !report.is_fresh && auto_fix {
            warn!(message = %report.message, "Data is unhealthy; auto-fix is on, running a forced sync");
            Some(self.sync_for(today, true).await)
        } else {
            None
        };
        HealthCheck { report, fix }
    }

    /// The best available document for `today`.
    ///
    /// # Errors
    ///
    /// Only [`PipelineError::ExhaustedFallback`].
    #[instrument(level = "info", skip_all, fields(%today))]
    pub async fn serve_document(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Resolved, PipelineError> {
        let status = self.store.read_status().await;
        let todays = self.store.read(today).await;
        let state = evaluate(
            status.as_ref(),
            todays.is_some(),
            today,
            now,
            self.config.freshness_threshold(),
        );
        if !state.is_fresh() {
            info!(%state, "Gate is not fresh; consulting fallback tiers");
        }
        let source = TodayPreloaded {
            store: &self.store,
            today,
            document: todays,
        };
        let mut resolved = resolve(&source, today, static_document()).await?;
        resolved.is_fresh &= state.is_fresh();
        Ok(resolved)
    }

    /// Re-check freshness on a fixed interval and sync in the background
    /// whenever the gate is not FRESH and nothing is already in flight.
    /// A tick that finds a sync running is skipped, not queued.
    pub async fn watch(&self) {
        let mut ticker = tokio::time::interval(self.config.watch_interval());
        loop {
            ticker.tick().await;
            let today = today_local();
            let (state, _) = self.gate(today, Utc::now()).await;
            if state.is_fresh() {
                debug!("Watcher: data is fresh");
                continue;
            }
            let Ok(_run) = self.run_lock.try_lock() else {
                debug!(%state, "Watcher: sync already in flight");
                continue;
            };
            if self.retry.pending().await.is_some() {
                debug!(%state, "Watcher: retry already pending");
                continue;
            }
            warn!(%state, "Watcher: data is not fresh; starting sync");
            let outcome = self.sync_locked(today, false).await;
            info!(success = outcome.is_success(), "Watcher: sync finished");
        }
    }
}

fn empty_draft(date: NaiveDate, now: DateTime<Utc>) -> DailyDocument {
    DailyDocument {
        date,
        keywords: Vec::new(),
        news: Vec::new(),
        bandai: Vec::new(),
        hot_toys: Vec::new(),
        steam: Vec::new(),
        playstation: Vec::new(),
        nintendo: NintendoDeals {
            has_deals: false,
            deals: Vec::new(),
            note: None,
        },
        generated_at: now,
        data_quality: DataQuality {
            freshness: Freshness::Fresh,
            sources: Vec::new(),
            confidence: 0,
        },
    }
}
