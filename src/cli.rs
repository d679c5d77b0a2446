//! Command-line interface definitions for Daily Push.
//!
//! Every subcommand shares the global `--config` and `--output-dir` options;
//! the output directory and bind address can also come from the environment.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Generate, check and serve the daily digest.
///
/// # Examples
///
/// ```sh
/// # Regenerate today's document if it is not fresh
/// daily_push sync
///
/// # Backfill a specific day
/// daily_push generate --date 2026-02-26
///
/// # Exit 1 when the data is stale, regenerating first if AUTO_FIX=true
/// AUTO_FIX=true daily_push health
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file; the built-in config is used otherwise
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the dated documents and the status record
    #[arg(short, long, global = true, env = "DAILY_PUSH_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run one generation and write the document for a date (default: today)
    Generate {
        /// Date to generate, as YYYY-MM-DD
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Regenerate today's document unless it is already fresh
    Sync {
        /// Only report the freshness verdict; exit 0 when fresh
        #[arg(short = 'c', long)]
        health_check: bool,

        /// Regenerate even when the data is fresh
        #[arg(short, long)]
        retry: bool,
    },

    /// Report data health with a suggested action
    Health {
        /// Run a forced sync when the data is unhealthy
        #[arg(long, env = "AUTO_FIX", default_value_t = false)]
        auto_fix: bool,
    },

    /// Serve the HTTP API with a background freshness watcher
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "DAILY_PUSH_BIND", default_value = "0.0.0.0:3000")]
        bind: SocketAddr,
    },
}
