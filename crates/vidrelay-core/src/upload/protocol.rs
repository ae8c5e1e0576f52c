//! Resumable upload wire format: request headers and reply interpretation.
//!
//! Kept free of I/O so the curl adapter stays a thin shell.

use super::{ChunkResponse, SessionHandle, UploadError};
use crate::retry::classify_upload_rejection;

/// HTTP status the service uses for "resume incomplete".
pub(super) const RESUME_INCOMPLETE: u32 = 308;

/// A reply as captured by curl: status, header lines of the final response, body.
#[derive(Debug, Clone, Default)]
pub(super) struct RawResponse {
    pub code: u32,
    pub headers: Vec<String>,
    pub body: String,
}

impl RawResponse {
    /// Case-insensitive header lookup within the last response block.
    pub fn header(&self, name: &str) -> Option<&str> {
        let start = self
            .headers
            .iter()
            .rposition(|l| l.starts_with("HTTP/"))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.headers[start..].iter().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}

/// Session-initiation URL for `endpoint`.
pub(super) fn init_url(endpoint: &str) -> String {
    let sep = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}uploadType=resumable&part=snippet,status", endpoint, sep)
}

/// `Content-Range` for a chunk of `length` bytes at `offset`.
pub(super) fn chunk_content_range(offset: u64, length: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", offset, offset + length - 1, total)
}

/// `Content-Range` for an empty status query.
pub(super) fn status_content_range(total: u64) -> String {
    format!("bytes */{}", total)
}

/// Bytes held by the service from a `Range: bytes=0-N` reply header.
pub(super) fn parse_range_ack(value: &str) -> Option<u64> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    if start.trim() != "0" {
        return None;
    }
    end.trim().parse::<u64>().ok()?.checked_add(1)
}

pub(super) fn rejection(action: &str, resp: &RawResponse) -> UploadError {
    let kind = classify_upload_rejection(resp.code, &resp.body);
    let detail = serde_json::from_str::<serde_json::Value>(&resp.body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| resp.body.chars().take(200).collect());
    UploadError::new(kind, format!("{} returned HTTP {}: {}", action, resp.code, detail.trim()))
}

/// Session URI from the initiation reply.
pub(super) fn interpret_init(resp: &RawResponse) -> Result<SessionHandle, UploadError> {
    if !(200..300).contains(&resp.code) {
        return Err(rejection("session initiation", resp));
    }
    resp.header("location")
        .filter(|l| !l.is_empty())
        .map(|l| SessionHandle(l.to_string()))
        .ok_or_else(|| UploadError::permanent("session initiation reply has no Location header"))
}

/// Reply to a chunk PUT or a status query.
pub(super) fn interpret_chunk(resp: &RawResponse) -> Result<ChunkResponse, UploadError> {
    match resp.code {
        RESUME_INCOMPLETE => {
            let bytes_acked = match resp.header("range") {
                Some(v) => parse_range_ack(v).ok_or_else(|| {
                    UploadError::permanent(format!("unparseable Range header {:?}", v))
                })?,
                None => 0,
            };
            Ok(ChunkResponse::Progress { bytes_acked })
        }
        200 | 201 => {
            let value: serde_json::Value = serde_json::from_str(&resp.body).map_err(|e| {
                UploadError::permanent(format!("completion reply is not JSON: {}", e))
            })?;
            let remote_id = value
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| UploadError::permanent("completion reply has no id"))?;
            Ok(ChunkResponse::Completed {
                remote_id: remote_id.to_string(),
            })
        }
        // Session expired; resuming it is impossible.
        404 | 410 => Err(UploadError::permanent(format!(
            "upload session gone (HTTP {})",
            resp.code
        ))),
        _ => Err(rejection("chunk upload", resp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ErrorKind;

    fn resp(code: u32, headers: &[&str], body: &str) -> RawResponse {
        RawResponse {
            code,
            headers: headers.iter().map(|s| s.to_string()).collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn content_ranges() {
        assert_eq!(chunk_content_range(0, 8, 20), "bytes 0-7/20");
        assert_eq!(chunk_content_range(16, 4, 20), "bytes 16-19/20");
        assert_eq!(status_content_range(20), "bytes */20");
    }

    #[test]
    fn init_url_appends_query() {
        assert_eq!(
            init_url("https://up.example/videos"),
            "https://up.example/videos?uploadType=resumable&part=snippet,status"
        );
        assert!(init_url("https://up.example/v?alt=json").contains("alt=json&uploadType"));
    }

    #[test]
    fn range_ack_is_end_plus_one() {
        assert_eq!(parse_range_ack("bytes=0-41943039"), Some(41943040));
        assert_eq!(parse_range_ack("bytes=5-9"), None);
        assert_eq!(parse_range_ack("junk"), None);
    }

    #[test]
    fn resume_incomplete_without_range_means_nothing_held() {
        let r = resp(308, &["HTTP/1.1 308 Resume Incomplete"], "");
        assert_eq!(interpret_chunk(&r).unwrap(), ChunkResponse::Progress { bytes_acked: 0 });
        let r = resp(308, &["HTTP/1.1 308", "Range: bytes=0-99"], "");
        assert_eq!(interpret_chunk(&r).unwrap(), ChunkResponse::Progress { bytes_acked: 100 });
    }

    #[test]
    fn completion_carries_id() {
        let r = resp(200, &[], r#"{"kind":"youtube#video","id":"abc123"}"#);
        assert_eq!(
            interpret_chunk(&r).unwrap(),
            ChunkResponse::Completed { remote_id: "abc123".into() }
        );
    }

    #[test]
    fn quota_rejection_is_fatal() {
        let body = r#"{"error":{"code":403,"message":"quota","errors":[{"reason":"quotaExceeded"}]}}"#;
        let err = interpret_chunk(&resp(403, &[], body)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FatalQuota);
        assert!(err.message.contains("quota"));
        let err = interpret_chunk(&resp(503, &[], "")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transient);
    }

    #[test]
    fn init_reads_location_of_final_response() {
        let r = resp(
            200,
            &[
                "HTTP/1.1 100 Continue",
                "Location: https://wrong",
                "HTTP/1.1 200 OK",
                "Location: https://up.example/session/1",
            ],
            "",
        );
        assert_eq!(interpret_init(&r).unwrap().as_str(), "https://up.example/session/1");
        let err = interpret_init(&resp(401, &[], "")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FatalAuth);
    }
}
