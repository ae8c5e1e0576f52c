//! HTTP HEAD probing for media sources.
//!
//! Uses the curl crate (libcurl) to confirm `Content-Length` and
//! `Accept-Ranges: bytes` before a segmented download is planned.

use std::collections::HashMap;
use std::str;
use std::time::Duration;

use super::SourceError;
use crate::retry::{classify_curl_error, classify_http_status};

/// Result of a HEAD request: key headers needed for a segmented download.
#[derive(Debug, Clone, Default)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// True if server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// `Content-Type` value if present.
    pub content_type: Option<String>,
}

/// Performs a HEAD request and returns parsed metadata.
///
/// Follows redirects. Runs in the current thread; call from `spawn_blocking`
/// if used from async code.
pub fn probe(url: &str, custom_headers: &HashMap<String, String>) -> Result<HeadResult, SourceError> {
    let curl_err = |e: curl::Error| SourceError::new(classify_curl_error(&e), format!("HEAD {}: {}", url, e));
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.nobody(true).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(15)).map_err(curl_err)?;
    easy.timeout(Duration::from_secs(30)).map_err(curl_err)?;

    let mut list = curl::easy::List::new();
    for (k, v) in custom_headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(curl_err)?;
    }
    if !custom_headers.is_empty() {
        easy.http_headers(list).map_err(curl_err)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(curl_err)?;
        transfer.perform().map_err(curl_err)?;
    }

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        return Err(SourceError::new(
            classify_http_status(code),
            format!("HEAD {} returned HTTP {}", url, code),
        ));
    }

    Ok(parse_headers(&headers))
}

/// Parse collected header lines into a `HeadResult`.
///
/// When redirects were followed, only the headers after the last status line count.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    let mut out = HeadResult::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            out = HeadResult::default();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    out.content_length = Some(n);
                }
            } else if name.eq_ignore_ascii_case("accept-ranges") {
                out.accept_ranges = value.eq_ignore_ascii_case("bytes");
            } else if name.eq_ignore_ascii_case("content-type") {
                out.content_type = Some(value.to_string());
            }
        }
    }

    out
}

/// Status code from an HTTP status line (`HTTP/1.1 206 Partial Content`).
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}
