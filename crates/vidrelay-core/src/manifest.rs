//! Batch manifest: the list of items to relay, as TOML.
//!
//! ```toml
//! [[item]]
//! source = "https://media.example/file.mp4"
//! title = "Lecture 1"
//! category = "Mechanics"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use url::Url;

use crate::orchestrator::{ItemSource, WorkItem};
use crate::source::HttpSourceResolver;
use crate::upload::{Privacy, VideoMetadata, DEFAULT_CATEGORY_ID};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default, rename = "item")]
    items: Vec<RawEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    source: String,
    filename: Option<String>,
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    category_id: Option<String>,
    privacy: Option<Privacy>,
    #[serde(default)]
    tags: Vec<String>,
}

/// One validated manifest entry with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub source: Url,
    pub filename: String,
    /// Playlist the upload is filed under.
    pub category: Option<String>,
    pub metadata: VideoMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("manifest {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(text)?;
        let mut entries = Vec::with_capacity(raw.items.len());
        for (i, item) in raw.items.into_iter().enumerate() {
            entries.push(entry_from_raw(item).with_context(|| format!("item {}", i + 1))?);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ManifestEntry {
    /// Batch item for this entry. The source is opened only when the
    /// orchestrator reaches the item.
    pub fn work_item(&self, segment_size: u64) -> WorkItem {
        WorkItem {
            source_ref: self.source.to_string(),
            declared_filename: self.filename.clone(),
            category: self.category.clone(),
            metadata: self.metadata.clone(),
            source: ItemSource::deferred(HttpSourceResolver::new(self.source.as_str(), segment_size)),
        }
    }
}

fn entry_from_raw(raw: RawEntry) -> Result<ManifestEntry> {
    let source = Url::parse(raw.source.trim()).with_context(|| format!("invalid source {:?}", raw.source))?;
    if !matches!(source.scheme(), "http" | "https") {
        bail!("source must be an http or https URL, got {}", source.scheme());
    }

    let filename = raw
        .filename
        .filter(|f| !f.trim().is_empty())
        .or_else(|| filename_from_url(&source))
        .with_context(|| format!("no filename given and none derivable from {}", source))?;
    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| filename.clone());
    let description = raw
        .description
        .unwrap_or_else(|| format!("Exported video from {}", source));

    Ok(ManifestEntry {
        metadata: VideoMetadata {
            title,
            description,
            tags: raw.tags,
            category_id: raw.category_id.unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string()),
            privacy: raw.privacy.unwrap_or_default(),
        },
        source,
        filename,
        category: raw.category.filter(|c| !c.trim().is_empty()),
    })
}

/// Last non-empty path segment, percent-decoded.
fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(last);
    (!decoded.trim().is_empty()).then_some(decoded)
}

fn percent_decode(s: &str) -> String {
    fn hex(b: u8) -> Option<u8> {
        (b as char).to_digit(16).map(|d| d as u8)
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
