//! Best-effort steps run after a successful upload.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::item::WorkItem;
use crate::upload::PlaylistClient;

/// Runs after an item is uploaded. Errors are logged and never change the
/// item's result.
#[async_trait]
pub trait PostUploadHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after_upload(&self, item: &WorkItem, remote_id: &str) -> anyhow::Result<()>;
}

/// Appends one JSON object per uploaded item to a file for follow-up tooling.
#[derive(Debug, Clone)]
pub struct JsonLinesHook {
    path: PathBuf,
}

impl JsonLinesHook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PostUploadHook for JsonLinesHook {
    fn name(&self) -> &str {
        "json-lines"
    }

    async fn after_upload(&self, item: &WorkItem, remote_id: &str) -> anyhow::Result<()> {
        use anyhow::Context;
        use tokio::io::AsyncWriteExt;

        let mut line = serde_json::to_string(&serde_json::json!({
            "source": item.source_ref,
            "remote_id": remote_id,
            "title": item.metadata.title,
            "tags": item.metadata.tags,
        }))?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Adds the uploaded video to the playlist named after the item's category,
/// creating the playlist on first use. Items without a category are left alone.
#[derive(Debug, Clone)]
pub struct PlaylistHook {
    client: Arc<PlaylistClient>,
}

impl PlaylistHook {
    pub fn new(client: Arc<PlaylistClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PostUploadHook for PlaylistHook {
    fn name(&self) -> &str {
        "playlist"
    }

    async fn after_upload(&self, item: &WorkItem, remote_id: &str) -> anyhow::Result<()> {
        use anyhow::Context;

        let Some(category) = item.category.as_deref() else {
            return Ok(());
        };
        let playlist = self
            .client
            .find_or_create(category)
            .await
            .with_context(|| format!("playlist {:?}", category))?;
        self.client
            .add_video(&playlist, remote_id)
            .await
            .with_context(|| format!("add {} to playlist {:?}", remote_id, category))?;
        tracing::info!(video = remote_id, playlist = %playlist, category, "added to playlist");
        Ok(())
    }
}
