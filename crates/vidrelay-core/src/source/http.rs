//! HTTP media source: HEAD probe for size, curl Range GET per segment.
//!
//! Each range runs on a blocking thread; body pieces are forwarded through a
//! bounded channel so the worker consumes them as a lazy stream and the
//! transfer applies backpressure to libcurl.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::probe::{parse_status_line, probe};
use super::{ChunkStream, MediaSource, SourceError, SourceResolver};
use crate::retry::{classify_curl_error, classify_http_status};

/// Pieces buffered between the curl thread and the worker.
const CHANNEL_DEPTH: usize = 16;

/// Probes a URL when resolved. A server without range support is refused
/// unless the whole object fits in one segment.
#[derive(Debug, Clone)]
pub struct HttpSourceResolver {
    url: String,
    headers: HashMap<String, String>,
    segment_size: u64,
}

impl HttpSourceResolver {
    pub fn new(url: &str, segment_size: u64) -> Self {
        Self {
            url: url.to_string(),
            headers: HashMap::new(),
            segment_size,
        }
    }
}

#[async_trait]
impl SourceResolver for HttpSourceResolver {
    async fn resolve(&self) -> Result<Arc<dyn MediaSource>, SourceError> {
        let source = HttpMediaSource::open(&self.url, self.headers.clone()).await?;
        if !source.accept_ranges() && source.size() > self.segment_size {
            return Err(SourceError::permanent(format!(
                "{} does not support range requests",
                self.url
            )));
        }
        Ok(Arc::new(source))
    }
}

/// Remote object served over HTTP(S) with byte-range support.
#[derive(Debug, Clone)]
pub struct HttpMediaSource {
    url: Arc<str>,
    headers: Arc<HashMap<String, String>>,
    size: u64,
    accept_ranges: bool,
}

impl HttpMediaSource {
    /// Probe `url` with HEAD and build a source of the advertised size.
    pub async fn open(url: &str, headers: HashMap<String, String>) -> Result<Self, SourceError> {
        let probe_url = url.to_string();
        let probe_headers = headers.clone();
        let head = tokio::task::spawn_blocking(move || probe(&probe_url, &probe_headers))
            .await
            .map_err(|e| SourceError::permanent(format!("probe task join: {}", e)))??;
        let size = head.content_length.ok_or_else(|| {
            SourceError::permanent(format!("{} did not report Content-Length", url))
        })?;
        tracing::debug!(url, size, accept_ranges = head.accept_ranges, "probed media source");
        Ok(Self::with_size(url, headers, size, head.accept_ranges))
    }

    /// Build a source without probing, for callers that already know the size.
    pub fn with_size(url: &str, headers: HashMap<String, String>, size: u64, accept_ranges: bool) -> Self {
        Self {
            url: Arc::from(url),
            headers: Arc::new(headers),
            size,
            accept_ranges,
        }
    }

    /// True if the server advertised `Accept-Ranges: bytes`.
    pub fn accept_ranges(&self) -> bool {
        self.accept_ranges
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    fn size(&self) -> u64 {
        self.size
    }

    async fn fetch_range(&self, offset: u64, length: u64) -> Result<ChunkStream, SourceError> {
        if length == 0 || offset.saturating_add(length) > self.size {
            return Err(SourceError::permanent(format!(
                "range {}+{} outside object of {} bytes",
                offset, length, self.size
            )));
        }
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_DEPTH);
        let url = Arc::clone(&self.url);
        let headers = Arc::clone(&self.headers);
        let whole_object = offset == 0 && length == self.size;
        tokio::task::spawn_blocking(move || {
            if let Err(e) = range_get(&url, &headers, offset, length, whole_object, &tx) {
                let _ = tx.blocking_send(Err(e));
            }
        });
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }
}

/// Blocking Range GET. Body pieces go to `tx`; a dropped receiver aborts the transfer.
fn range_get(
    url: &str,
    headers: &HashMap<String, String>,
    offset: u64,
    length: u64,
    whole_object: bool,
    tx: &tokio::sync::mpsc::Sender<Result<Vec<u8>, SourceError>>,
) -> Result<(), SourceError> {
    let curl_err = |e: curl::Error| SourceError::new(classify_curl_error(&e), format!("GET {}: {}", url, e));
    let status = Cell::new(0u32);
    let rejected = Cell::new(false);

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(30)).map_err(curl_err)?;
    // Abort if throughput drops below 1 KiB/s for 60s rather than using a hard wall-clock timeout.
    easy.low_speed_limit(1024).map_err(curl_err)?;
    easy.low_speed_time(Duration::from_secs(60)).map_err(curl_err)?;
    easy.range(&format!("{}-{}", offset, offset + length - 1))
        .map_err(curl_err)?;

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(curl_err)?;
    }
    if !headers.is_empty() {
        easy.http_headers(list).map_err(curl_err)?;
    }

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Some(code) = std::str::from_utf8(data).ok().and_then(parse_status_line) {
                    status.set(code);
                }
                true
            })
            .map_err(curl_err)?;
        transfer
            .write_function(|data| {
                // 200 means the server ignored Range; only acceptable for the whole object.
                let code = status.get();
                if code != 206 && !(code == 200 && whole_object) {
                    rejected.set(true);
                    return Ok(0);
                }
                match tx.blocking_send(Ok(data.to_vec())) {
                    Ok(()) => Ok(data.len()),
                    Err(_) => Ok(0),
                }
            })
            .map_err(curl_err)?;
        transfer.perform()
    };

    let code = easy.response_code().unwrap_or(status.get());
    if !(200..300).contains(&code) {
        return Err(SourceError::new(
            classify_http_status(code),
            format!("GET {} range {}+{} returned HTTP {}", url, offset, length, code),
        ));
    }
    if rejected.get() {
        return Err(SourceError::permanent(format!(
            "{} ignored the Range request (HTTP {})",
            url, code
        )));
    }
    match perform_result {
        Ok(()) => Ok(()),
        // Receiver dropped: the worker stopped reading, nothing left to report.
        Err(e) if e.is_write_error() && tx.is_closed() => Ok(()),
        Err(e) => Err(curl_err(e)),
    }
}
