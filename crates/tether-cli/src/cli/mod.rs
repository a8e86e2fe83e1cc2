//! Diagnostic CLI for the tether resilience layer.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tether_core::config;

use commands::{
    run_cancel, run_clear, run_errors, run_probe, run_queue, run_status, run_sweep,
};

/// Top-level CLI for the tether resilience layer.
#[derive(Debug, Parser)]
#[command(name = "tether")]
#[command(about = "tether: offline-resilience toolkit (cache, retry queue, connectivity)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show connectivity, cache, and retry-queue state.
    Status,

    /// Run a speed test against a probe endpoint and print the result.
    Probe {
        /// Probe base URL; defaults to the configured one.
        base_url: Option<String>,
    },

    /// Purge expired cache entries now.
    Sweep,

    /// Clear the cache, and optionally the persisted histories.
    Clear {
        /// Also clear the error history.
        #[arg(long)]
        errors: bool,
        /// Also clear the connectivity event history.
        #[arg(long)]
        events: bool,
    },

    /// Show recent classified errors.
    Errors {
        /// Maximum number of reports to print.
        #[arg(long, default_value = "20", value_name = "N")]
        limit: usize,
    },

    /// List persisted retry-queue rows.
    Queue,

    /// Remove a queued operation by its id.
    Cancel {
        /// Operation identifier.
        id: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Status => run_status(&cfg).await?,
            CliCommand::Probe { base_url } => run_probe(&cfg, base_url.as_deref()).await?,
            CliCommand::Sweep => run_sweep(&cfg).await?,
            CliCommand::Clear { errors, events } => run_clear(&cfg, errors, events).await?,
            CliCommand::Errors { limit } => run_errors(&cfg, limit)?,
            CliCommand::Queue => run_queue().await?,
            CliCommand::Cancel { id } => run_cancel(&id).await?,
        }

        Ok(())
    }
}
