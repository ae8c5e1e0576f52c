//! CLI for vidrelay.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vidrelay_core::config;

use commands::{run_batch, run_forget, run_probe, run_status, RunArgs};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "vidrelay")]
#[command(about = "vidrelay: segmented video download and resumable re-upload", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download and upload every item of a manifest, one at a time.
    Run {
        /// Path to the TOML manifest.
        manifest: PathBuf,
        /// Concurrent segment workers (overrides config).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Download segment size in bytes (overrides config).
        #[arg(long, value_name = "BYTES")]
        segment_size: Option<u64>,
        /// Upload chunk size in bytes (overrides config).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u64>,
        /// Do not consult or update the ledger.
        #[arg(long)]
        no_ledger: bool,
        /// Do not file uploads into per-category playlists.
        #[arg(long)]
        no_playlists: bool,
        /// Append one JSON line per uploaded item to this file.
        #[arg(long, value_name = "PATH")]
        results: Option<PathBuf>,
    },

    /// Show the ledger.
    Status,

    /// Drop a source from the ledger so the next run uploads it again.
    Forget {
        /// Source URL as written in the manifest.
        source: String,
    },

    /// HEAD-probe a URL and show the segment plan.
    Probe {
        /// Direct HTTP/HTTPS URL.
        url: String,
        /// Segment size in bytes (defaults to config).
        #[arg(long, value_name = "BYTES")]
        segment_size: Option<u64>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                manifest,
                workers,
                segment_size,
                chunk_size,
                no_ledger,
                no_playlists,
                results,
            } => {
                let args = RunArgs {
                    manifest,
                    workers,
                    segment_size,
                    chunk_size,
                    no_ledger,
                    no_playlists,
                    results,
                };
                run_batch(cfg, args).await?;
            }
            CliCommand::Status => run_status().await?,
            CliCommand::Forget { source } => run_forget(&source).await?,
            CliCommand::Probe { url, segment_size } => {
                run_probe(&url, segment_size.unwrap_or(cfg.segment_size)).await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
