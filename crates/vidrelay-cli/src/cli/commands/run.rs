//! `vidrelay run <manifest>` – relay every manifest item.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use vidrelay_core::config::RelayConfig;
use vidrelay_core::control::AbortToken;
use vidrelay_core::ledger::Ledger;
use vidrelay_core::manifest::Manifest;
use vidrelay_core::orchestrator::{ItemResult, JsonLinesHook, Orchestrator, PlaylistHook, WorkItem};
use vidrelay_core::upload::{HttpUploadService, PlaylistClient};

use super::progress;

/// Environment variable holding the OAuth bearer token for uploads.
pub const ACCESS_TOKEN_ENV: &str = "VIDRELAY_ACCESS_TOKEN";

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub manifest: PathBuf,
    pub workers: Option<usize>,
    pub segment_size: Option<u64>,
    pub chunk_size: Option<u64>,
    pub no_ledger: bool,
    pub no_playlists: bool,
    pub results: Option<PathBuf>,
}

pub(crate) fn apply_overrides(cfg: &mut RelayConfig, args: &RunArgs) {
    if let Some(n) = args.workers {
        cfg.workers = n;
    }
    if let Some(s) = args.segment_size {
        cfg.segment_size = s;
    }
    if let Some(c) = args.chunk_size {
        cfg.upload_chunk_size = c;
    }
}

pub async fn run_batch(mut cfg: RelayConfig, args: RunArgs) -> Result<()> {
    apply_overrides(&mut cfg, &args);
    cfg.validate()?;

    let token = std::env::var(ACCESS_TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .with_context(|| format!("{} is not set", ACCESS_TOKEN_ENV))?;

    let manifest = Manifest::load(&args.manifest)?;
    if manifest.is_empty() {
        println!("Manifest has no items.");
        return Ok(());
    }

    let work_dir = cfg.resolved_download_dir()?;
    let options = cfg.pipeline_options(work_dir.clone());
    let service = Arc::new(HttpUploadService::new(&cfg.upload_endpoint, token.trim()));

    let ledger = if args.no_ledger {
        None
    } else {
        Some(Ledger::open_default().await?)
    };

    // Sources are resolved when their turn comes, after the ledger check.
    let items: Vec<WorkItem> = manifest
        .entries
        .iter()
        .map(|entry| entry.work_item(cfg.segment_size))
        .collect();
    println!("{} item(s) to relay into {}", items.len(), work_dir.display());

    let abort = AbortToken::new();
    {
        let abort = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted; finishing the current transfer step and stopping.");
                abort.abort();
            }
        });
    }

    let (tx, rx) = tokio::sync::mpsc::channel(64);
    let printer = progress::spawn_printer(rx);

    let mut orchestrator = Orchestrator::new(service, options)
        .with_progress(tx)
        .with_abort(abort);
    if let Some(ledger) = ledger {
        orchestrator = orchestrator.with_ledger(ledger);
    }
    if !args.no_playlists {
        let client = Arc::new(PlaylistClient::new(&cfg.playlist_api, token.trim()));
        orchestrator = orchestrator.with_hook(Arc::new(PlaylistHook::new(client)));
    }
    if let Some(path) = &args.results {
        orchestrator = orchestrator.with_hook(Arc::new(JsonLinesHook::new(path.clone())));
    }

    let report = orchestrator.run_batch(&items).await;
    // Dropping the orchestrator closes the progress channel so the printer exits.
    drop(orchestrator);
    let _ = printer.await;

    for (source, result) in &report.results {
        match result {
            ItemResult::Success { remote_id } => println!("uploaded  {} -> {}", source, remote_id),
            ItemResult::AlreadyUploaded { remote_id } => println!(
                "skipped   {} (already uploaded{})",
                source,
                remote_id.as_deref().map(|id| format!(" as {}", id)).unwrap_or_default()
            ),
            ItemResult::Failed { reason } => println!("failed    {}: {}", source, reason),
            ItemResult::Fatal { reason } => println!("fatal     {}: {}", source, reason),
        }
    }
    for source in &report.skipped {
        println!("not run   {}", source);
    }
    println!(
        "Done: {} uploaded, {} already uploaded, {} failed, {} not run.",
        report.uploaded(),
        report.already_uploaded(),
        report.failed(),
        report.skipped.len()
    );

    if let Some(reason) = &report.halted {
        anyhow::bail!("batch halted: {}", reason);
    }
    if report.aborted {
        anyhow::bail!("batch aborted");
    }
    if report.failed() > 0 {
        anyhow::bail!("{} item(s) failed", report.failed());
    }
    Ok(())
}
