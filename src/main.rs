//! # Daily Push
//!
//! Generates a dated daily digest (AI news, collectible figures and game
//! deals), keeps it fresh, and serves the best available version to a static
//! website.
//!
//! ## Features
//!
//! - Pulls news from 36Kr and ITHome RSS and the Zhihu hot list, plus figure
//!   and game-deal listings (Bandai, Hot Toys, Steam, PlayStation, Nintendo)
//! - Validates and corrects every batch, merges and ranks news, pads short
//!   lists from a backup set and scores the result
//! - Persists one JSON document per day with atomic writes
//! - Never serves an error for stale data: falls back to yesterday, the last
//!   seven days, then a built-in static document
//! - Retries failed syncs (3 attempts, 5 minutes apart)
//!
//! ## Usage
//!
//! ```sh
//! daily_push sync            # regenerate today's document unless fresh
//! daily_push sync -c         # exit 0 only when fresh
//! daily_push serve           # HTTP API on 0.0.0.0:3000
//! ```
//!
//! ## Architecture
//!
//! A generation run has five stages:
//! 1. **Fetching**: every source runs concurrently; failures stay inside the fetcher
//! 2. **Validation**: batches are checked and corrected
//! 3. **Merging**: news is deduplicated, ranked and padded
//! 4. **Scoring**: a confidence score is derived from the finished document
//! 5. **Persistence**: the document and the status record are written

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod fallback;
mod freshness;
mod merger;
mod models;
mod pipeline;
mod retry;
mod scorer;
mod server;
mod sources;
mod store;
mod utils;
mod validator;

use cli::{Cli, Command};
use config::PipelineConfig;
use pipeline::{Pipeline, SyncOutcome};
use utils::{ensure_writable_dir, parse_date, today_local};

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("daily_push starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, ?args.command, "Parsed CLI arguments");

    // --- Load config ---
    let mut config = PipelineConfig::load(args.config.as_deref()).await?;
    if let Some(dir) = args.output_dir {
        config = config.with_output_dir(dir);
    }
    info!(output_dir = %config.output_dir.display(), "Configuration loaded");

    ensure_writable_dir(&config.output_dir).await.map_err(|e| {
        error!(path = %config.output_dir.display(), error = %e, "Output directory not writable");
        e
    })?;

    let pipeline = Pipeline::from_config(config)?;
    let today = today_local();

    let code = match args.command {
        Command::Generate { date } => {
            let date = match date {
                Some(raw) => parse_date(&raw)?,
                None => today,
            };
            let generated = pipeline.generate_for(date, today).await?;
            println!(
                "Generated {} ({} news, confidence {})",
                generated.path.display(),
                generated.document.news.len(),
                generated.document.data_quality.confidence
            );
            ExitCode::SUCCESS
        }

        Command::Sync {
            health_check: true, ..
        } => {
            let (state, _) = pipeline.gate(today, Utc::now()).await;
            println!("{state}");
            exit_code(state.is_fresh())
        }

        Command::Sync { retry, .. } => {
            let outcome = pipeline.sync_for(today, retry).await;
            report_sync(&outcome);
            exit_code(outcome.is_success())
        }

        Command::Health { auto_fix } => {
            let check = pipeline.health_check(today, Utc::now(), auto_fix).await;
            println!("{}", serde_json::to_string_pretty(&check.report)?);
            match &check.fix {
                Some(outcome) => report_sync(outcome),
                None if !check.is_healthy() => {
                    println!("Action: run `daily_push sync` or set AUTO_FIX=true");
                }
                None => {}
            }
            exit_code(check.is_healthy())
        }

        Command::Serve { bind } => {
            server::serve(Arc::new(pipeline), bind).await?;
            ExitCode::SUCCESS
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs(),
        elapsed_ms = elapsed.as_millis(),
        "Execution finished"
    );
    Ok(code)
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report_sync(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::AlreadyFresh => println!("Data is fresh; nothing to do"),
        SyncOutcome::Generated { date, attempts } => {
            println!("Synced {date} after {attempts} attempt(s)");
        }
        SyncOutcome::Failed {
            date,
            attempts,
            error,
            fallback,
            superseded,
        } => {
            let serving = fallback.map_or_else(|| "nothing".to_string(), |t| t.label());
            println!(
                "Sync for {date} failed after {attempts} attempt(s){}: {error}; serving {serving}",
                if *superseded { " (superseded)" } else { "" }
            );
        }
    }
}
