//! Classify HTTP status, service rejections and curl errors into retry kinds.

use crate::retry::policy::ErrorKind;

/// Error reasons the video service uses for quota and upload-limit rejections.
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "uploadLimitExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

/// Classify an HTTP status code for retry decisions (no body available).
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 | 429 => ErrorKind::Transient,
        500..=599 => ErrorKind::Transient,
        401 | 403 => ErrorKind::FatalAuth,
        _ => ErrorKind::Permanent,
    }
}

/// Classify a non-success upload reply using its JSON error body.
///
/// A 403 carrying one of the quota reasons is `FatalQuota`; any other 403 is
/// treated as an authorization failure.
pub fn classify_upload_rejection(code: u32, body: &str) -> ErrorKind {
    if code == 403 && error_reasons(body).iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) {
        return ErrorKind::FatalQuota;
    }
    classify_http_status(code)
}

/// Extracts `error.errors[].reason` (and `error.status`) from a Google-style error body.
fn error_reasons(body: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if let Some(errors) = value.pointer("/error/errors").and_then(|v| v.as_array()) {
        for e in errors {
            if let Some(reason) = e.get("reason").and_then(|r| r.as_str()) {
                out.push(reason.to_string());
            }
        }
    }
    if let Some(status) = value.pointer("/error/status").and_then(|v| v.as_str()) {
        if status == "RESOURCE_EXHAUSTED" {
            out.push("quotaExceeded".to_string());
        }
    }
    out
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Transient;
    }
    ErrorKind::Permanent
}
