//! `vidrelay probe <url>` – HEAD probe and segment plan.

use anyhow::{Context, Result};
use std::collections::HashMap;
use vidrelay_core::segmenter::plan_segments;
use vidrelay_core::source::probe;

pub async fn run_probe(url: &str, segment_size: u64) -> Result<()> {
    let head = tokio::task::spawn_blocking({
        let url = url.to_string();
        move || probe(&url, &HashMap::new())
    })
    .await
    .context("probe task join")?
    .context("HEAD request failed")?;

    let size = head
        .content_length
        .ok_or_else(|| anyhow::anyhow!("server did not send Content-Length"))?;
    let segments = plan_segments(size, segment_size)?;

    println!("URL:           {}", url);
    println!("Size:          {} bytes", size);
    println!("Accept-Ranges: {}", if head.accept_ranges { "bytes" } else { "none" });
    if let Some(ct) = &head.content_type {
        println!("Content-Type:  {}", ct);
    }
    println!(
        "Plan:          {} segment(s) of {} bytes (last {} bytes)",
        segments.len(),
        segment_size,
        segments.last().map(|s| s.length).unwrap_or(0)
    );
    if !head.accept_ranges && segments.len() > 1 {
        println!("Warning: server does not advertise range support; segmented download will be refused.");
    }
    Ok(())
}
