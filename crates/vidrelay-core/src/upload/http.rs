//! curl-backed `RemoteUploadService` speaking the resumable upload protocol.

use async_trait::async_trait;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use super::protocol::{self, RawResponse};
use super::{ChunkResponse, RemoteUploadService, SessionHandle, UploadError, VideoMetadata};
use crate::retry::classify_curl_error;

/// Upload endpoint of the video service.
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Talks to the upload endpoint with a ready bearer token.
#[derive(Clone)]
pub struct HttpUploadService {
    endpoint: Arc<str>,
    access_token: Arc<str>,
}

impl std::fmt::Debug for HttpUploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUploadService")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

pub(super) enum Method {
    Get,
    Post,
    Put,
}

pub(super) struct Request {
    pub(super) method: Method,
    pub(super) url: String,
    pub(super) headers: Vec<String>,
    pub(super) body: Vec<u8>,
}

impl HttpUploadService {
    pub fn new(endpoint: &str, access_token: &str) -> Self {
        Self {
            endpoint: Arc::from(endpoint),
            access_token: Arc::from(access_token),
        }
    }

    async fn execute(&self, request: Request) -> Result<RawResponse, UploadError> {
        execute(&self.access_token, request).await
    }
}

/// Run `request` with a bearer token on a blocking thread.
pub(super) async fn execute(token: &Arc<str>, request: Request) -> Result<RawResponse, UploadError> {
    let token = Arc::clone(token);
    tokio::task::spawn_blocking(move || perform(&token, request))
        .await
        .map_err(|e| UploadError::permanent(format!("request task join: {}", e)))?
}

#[async_trait]
impl RemoteUploadService for HttpUploadService {
    async fn begin_session(
        &self,
        total_size: u64,
        metadata: &VideoMetadata,
    ) -> Result<SessionHandle, UploadError> {
        let body = serde_json::to_vec(&metadata.resource_json())
            .map_err(|e| UploadError::permanent(format!("encode metadata: {}", e)))?;
        let resp = self
            .execute(Request {
                method: Method::Post,
                url: protocol::init_url(&self.endpoint),
                headers: vec![
                    "Content-Type: application/json; charset=UTF-8".to_string(),
                    format!("X-Upload-Content-Length: {}", total_size),
                    "X-Upload-Content-Type: video/*".to_string(),
                ],
                body,
            })
            .await?;
        protocol::interpret_init(&resp)
    }

    async fn send_chunk(
        &self,
        handle: &SessionHandle,
        offset: u64,
        bytes: Vec<u8>,
        total_size: u64,
    ) -> Result<ChunkResponse, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::permanent("empty chunk"));
        }
        let resp = self
            .execute(Request {
                method: Method::Put,
                url: handle.as_str().to_string(),
                headers: vec![format!(
                    "Content-Range: {}",
                    protocol::chunk_content_range(offset, bytes.len() as u64, total_size)
                )],
                body: bytes,
            })
            .await?;
        protocol::interpret_chunk(&resp)
    }

    async fn query_status(
        &self,
        handle: &SessionHandle,
        total_size: u64,
    ) -> Result<ChunkResponse, UploadError> {
        let resp = self
            .execute(Request {
                method: Method::Put,
                url: handle.as_str().to_string(),
                headers: vec![format!(
                    "Content-Range: {}",
                    protocol::status_content_range(total_size)
                )],
                body: Vec::new(),
            })
            .await?;
        protocol::interpret_chunk(&resp)
    }
}

/// Blocking request. Call from `spawn_blocking`.
fn perform(token: &str, request: Request) -> Result<RawResponse, UploadError> {
    let curl_err = |e: curl::Error| UploadError::new(classify_curl_error(&e), format!("{}: {}", request.url, e));
    let mut out = RawResponse::default();
    let mut body_out: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url).map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(30)).map_err(curl_err)?;
    easy.low_speed_limit(1024).map_err(curl_err)?;
    easy.low_speed_time(Duration::from_secs(60)).map_err(curl_err)?;
    let len = request.body.len() as u64;
    match request.method {
        Method::Get => easy.get(true).map_err(curl_err)?,
        Method::Post => {
            easy.post(true).map_err(curl_err)?;
            easy.post_field_size(len).map_err(curl_err)?;
        }
        Method::Put => {
            easy.upload(true).map_err(curl_err)?;
            easy.in_filesize(len).map_err(curl_err)?;
        }
    }

    let mut list = curl::easy::List::new();
    list.append(&format!("Authorization: Bearer {}", token))
        .map_err(curl_err)?;
    // curl would otherwise send `Expect: 100-continue` for large bodies.
    list.append("Expect:").map_err(curl_err)?;
    for h in &request.headers {
        list.append(h).map_err(curl_err)?;
    }
    easy.http_headers(list).map_err(curl_err)?;

    let mut body_in = request.body.as_slice();
    {
        let mut transfer = easy.transfer();
        transfer
            .read_function(|buf| Ok(body_in.read(buf).unwrap_or(0)))
            .map_err(curl_err)?;
        transfer
            .header_function(|data| {
                if let Ok(s) = std::str::from_utf8(data) {
                    let line = s.trim_end();
                    if !line.is_empty() {
                        out.headers.push(line.to_string());
                    }
                }
                true
            })
            .map_err(curl_err)?;
        transfer
            .write_function(|data| {
                body_out.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(curl_err)?;
        transfer.perform().map_err(curl_err)?;
    }

    out.code = easy.response_code().map_err(curl_err)?;
    out.body = String::from_utf8_lossy(&body_out).into_owned();
    Ok(out)
}
