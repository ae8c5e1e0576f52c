use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::downloader::{DownloadOptions, DEFAULT_SEGMENT_SIZE, DEFAULT_WORKERS};
use crate::orchestrator::PipelineOptions;
use crate::progress::DEFAULT_REPORT_INTERVAL;
use crate::retry::RetryPolicy;
use crate::upload::{DEFAULT_CHUNK_SIZE, DEFAULT_DATA_API, DEFAULT_UPLOAD_ENDPOINT};

/// Retry parameters shared by segment requeues and upload chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per segment or chunk, including the first.
    pub max_attempts: u32,
    /// Segment requeue delay; first upload backoff step (0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Upper bound for upload backoff.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.5,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay_secs.max(0.0))
    }

    /// Fixed-delay policy for requeued download segments.
    pub fn segment_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, self.base_delay())
    }

    /// Exponential policy for upload chunks and session initiation.
    pub fn upload_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay(),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/vidrelay/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Concurrent segment workers per download.
    pub workers: usize,
    /// Bytes per download segment.
    pub segment_size: u64,
    /// Bytes per upload chunk.
    pub upload_chunk_size: u64,
    /// Minimum spacing of progress lines.
    pub progress_interval_ms: u64,
    /// Where `.part` files live; defaults to the XDG cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    pub upload_endpoint: String,
    /// Data API root for playlist lookups and inserts.
    #[serde(default = "default_playlist_api")]
    pub playlist_api: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_playlist_api() -> String {
    DEFAULT_DATA_API.to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            segment_size: DEFAULT_SEGMENT_SIZE,
            upload_chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval_ms: DEFAULT_REPORT_INTERVAL.as_millis() as u64,
            download_dir: None,
            upload_endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            playlist_api: default_playlist_api(),
            retry: RetryConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Reject values that cannot drive a transfer.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.segment_size == 0 {
            bail!("segment_size must be greater than 0");
        }
        if self.upload_chunk_size == 0 {
            bail!("upload_chunk_size must be greater than 0");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if !self.retry.base_delay_secs.is_finite() || self.retry.base_delay_secs < 0.0 {
            bail!("retry.base_delay_secs must be a non-negative number");
        }
        if self.upload_endpoint.trim().is_empty() {
            bail!("upload_endpoint must not be empty");
        }
        if self.playlist_api.trim().is_empty() {
            bail!("playlist_api must not be empty");
        }
        Ok(())
    }

    /// Configured download directory, or `$XDG_CACHE_HOME/vidrelay`.
    pub fn resolved_download_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.download_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("vidrelay")?;
        Ok(xdg_dirs.create_cache_directory("")?)
    }

    /// Orchestrator options for a batch writing into `work_dir`.
    pub fn pipeline_options(&self, work_dir: PathBuf) -> PipelineOptions {
        PipelineOptions {
            work_dir,
            segment_size: self.segment_size,
            download: DownloadOptions {
                workers: self.workers,
                retry: self.retry.segment_policy(),
            },
            chunk_size: self.upload_chunk_size,
            upload_retry: self.retry.upload_policy(),
            progress_interval: Duration::from_millis(self.progress_interval_ms),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vidrelay")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RelayConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as `load_or_init` for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<RelayConfig> {
    if !path.exists() {
        let default_cfg = RelayConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: RelayConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
