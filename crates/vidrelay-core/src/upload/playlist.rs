//! Playlists of the uploading account: find by title, create, append videos.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use super::http::{execute, Method, Request};
use super::protocol::{rejection, RawResponse};
use super::UploadError;

/// Data API root of the video service.
pub const DEFAULT_DATA_API: &str = "https://www.googleapis.com/youtube/v3";

/// Listing pages fetched before giving up and creating the playlist.
const MAX_LIST_PAGES: usize = 20;

/// Talks to the playlist endpoints with a ready bearer token. Remembers
/// playlist ids by lowercased title so a batch lists them once per category.
pub struct PlaylistClient {
    api_base: String,
    access_token: Arc<str>,
    known: tokio::sync::Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for PlaylistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl PlaylistClient {
    pub fn new(api_base: &str, access_token: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: Arc::from(access_token),
            known: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Id of the playlist titled `title` (case-insensitive). A missing one is
    /// created private.
    pub async fn find_or_create(&self, title: &str) -> Result<String, UploadError> {
        let key = title.to_lowercase();
        let mut known = self.known.lock().await;
        if let Some(id) = known.get(&key) {
            return Ok(id.clone());
        }
        let id = match self.find(title).await? {
            Some(id) => id,
            None => {
                let id = self.create(title).await?;
                tracing::info!(playlist = title, id = %id, "created playlist");
                id
            }
        };
        known.insert(key, id.clone());
        Ok(id)
    }

    pub async fn add_video(&self, playlist_id: &str, video_id: &str) -> Result<(), UploadError> {
        let body = serde_json::json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": { "kind": "youtube#video", "videoId": video_id },
            },
        });
        let resp = self
            .send(Method::Post, self.url("playlistItems", &[("part", "snippet")])?, Some(body))
            .await?;
        json_reply("playlist item insert", &resp)?;
        Ok(())
    }

    async fn find(&self, title: &str) -> Result<Option<String>, UploadError> {
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let mut query = vec![("part", "snippet"), ("mine", "true"), ("maxResults", "50")];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.as_str()));
            }
            let resp = self.send(Method::Get, self.url("playlists", &query)?, None).await?;
            let page = json_reply("playlist list", &resp)?;
            if let Some(id) = playlist_id_by_title(&page, title) {
                return Ok(Some(id));
            }
            match page.get("nextPageToken").and_then(|t| t.as_str()) {
                Some(next) => page_token = Some(next.to_string()),
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    async fn create(&self, title: &str) -> Result<String, UploadError> {
        let body = serde_json::json!({
            "snippet": {
                "title": title,
                "description": format!("Auto-generated playlist for {}", title),
            },
            "status": { "privacyStatus": "private" },
        });
        let resp = self
            .send(Method::Post, self.url("playlists", &[("part", "snippet,status")])?, Some(body))
            .await?;
        json_reply("playlist insert", &resp)?
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| UploadError::permanent("playlist insert reply has no id"))
    }

    fn url(&self, resource: &str, query: &[(&str, &str)]) -> Result<String, UploadError> {
        let mut url = Url::parse(&format!("{}/{}", self.api_base, resource))
            .map_err(|e| UploadError::permanent(format!("bad playlist API base {}: {}", self.api_base, e)))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url.into())
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<RawResponse, UploadError> {
        let mut headers = Vec::new();
        let body = match body {
            Some(v) => {
                headers.push("Content-Type: application/json; charset=UTF-8".to_string());
                serde_json::to_vec(&v).map_err(|e| UploadError::permanent(format!("encode body: {}", e)))?
            }
            None => Vec::new(),
        };
        execute(
            &self.access_token,
            Request {
                method,
                url,
                headers,
                body,
            },
        )
        .await
    }
}

fn json_reply(action: &str, resp: &RawResponse) -> Result<serde_json::Value, UploadError> {
    if !(200..300).contains(&resp.code) {
        return Err(rejection(action, resp));
    }
    serde_json::from_str(&resp.body)
        .map_err(|e| UploadError::permanent(format!("{} reply is not JSON: {}", action, e)))
}

/// Id of the first listed playlist whose title matches, ignoring case.
fn playlist_id_by_title(page: &serde_json::Value, title: &str) -> Option<String> {
    page.get("items")?.as_array()?.iter().find_map(|item| {
        let listed = item.pointer("/snippet/title")?.as_str()?;
        if listed.to_lowercase() == title.to_lowercase() {
            item.get("id")?.as_str().map(String::from)
        } else {
            None
        }
    })
}
