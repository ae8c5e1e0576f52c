//! Progress lines for `run`, fed by the orchestrator's snapshot channel.

use vidrelay_core::progress::ProgressStats;

pub(super) fn format_line(stats: &ProgressStats) -> String {
    let done_mib = stats.bytes_done as f64 / 1_048_576.0;
    let total_mib = stats.total_bytes as f64 / 1_048_576.0;
    let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
    let eta = stats
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "  {:<8} {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}",
        stats.phase.as_str(),
        done_mib,
        total_mib,
        stats.fraction() * 100.0,
        rate_mib,
        eta
    )
}

/// Print every snapshot until all senders are dropped.
pub(super) fn spawn_printer(
    mut rx: tokio::sync::mpsc::Receiver<ProgressStats>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(stats) = rx.recv().await {
            println!("{}", format_line(&stats));
        }
    })
}
