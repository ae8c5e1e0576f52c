//! Minimal resumable-upload endpoint: POST opens a session, PUT appends in order.
//! Under `/api` it also keeps playlists: list, insert, and item insert.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
struct Session {
    total: u64,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub init_bodies: Vec<String>,
    pub auth_headers: Vec<String>,
    pub content_ranges: Vec<String>,
    /// `(id, title)` of every playlist, seeded or created.
    pub playlists: Vec<(String, String)>,
    /// `(playlist id, video id)` of every inserted item.
    pub playlist_items: Vec<(String, String)>,
    /// Number of playlist listing requests.
    pub playlist_lists: usize,
    pub playlist_creates: Vec<String>,
    sessions: Vec<Session>,
}

pub struct UploadServer {
    pub endpoint: String,
    pub api_base: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl UploadServer {
    pub fn with<R>(&self, f: impl FnOnce(&Recorded) -> R) -> R {
        f(&self.recorded.lock().unwrap())
    }

    /// Bytes received for session `n` (0-based).
    pub fn session_data(&self, n: usize) -> Vec<u8> {
        self.recorded.lock().unwrap().sessions[n].data.clone()
    }

    /// Seed an existing playlist; returns its id.
    pub fn add_playlist(&self, title: &str) -> String {
        let mut rec = self.recorded.lock().unwrap();
        let id = format!("PL{}", rec.playlists.len());
        rec.playlists.push((id.clone(), title.to_string()));
        id
    }
}

/// Start the endpoint. With `reject_init`, session initiation answers that
/// status with a JSON error body carrying `reason`.
pub fn start(reject_init: Option<(u16, &'static str)>) -> UploadServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let shared = Arc::clone(&recorded);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = Arc::clone(&shared);
            thread::spawn(move || handle(stream, port, reject_init, &shared));
        }
    });
    UploadServer {
        endpoint: format!("http://127.0.0.1:{}/upload/videos", port),
        api_base: format!("http://127.0.0.1:{}/api", port),
        recorded,
    }
}

fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 65536];
    let header_end = loop {
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let len: usize = header(&head, "content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    Some((head, body))
}

fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines()
        .skip(1)
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
}

fn respond(stream: &mut TcpStream, status: &str, extra: &str, body: &str) {
    let resp = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        status,
        body.len(),
        extra,
        body
    );
    let _ = stream.write_all(resp.as_bytes());
}

fn handle(
    mut stream: TcpStream,
    port: u16,
    reject_init: Option<(u16, &'static str)>,
    recorded: &Mutex<Recorded>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };
    let request_line = head.lines().next().unwrap_or("").to_string();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    let mut rec = recorded.lock().unwrap();
    rec.auth_headers
        .push(header(&head, "authorization").unwrap_or("").to_string());

    if path.starts_with("/api/") {
        let (status, reply) = playlist_api(method, path, &body, &mut rec);
        respond(&mut stream, status, "", &reply);
        return;
    }

    if method == "POST" {
        rec.init_bodies.push(String::from_utf8_lossy(&body).into_owned());
        if let Some((code, reason)) = reject_init {
            let err = format!(
                r#"{{"error":{{"code":{},"message":"rejected","errors":[{{"reason":"{}"}}]}}}}"#,
                code, reason
            );
            respond(&mut stream, &format!("{} Rejected", code), "", &err);
            return;
        }
        let total = header(&head, "x-upload-content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        rec.sessions.push(Session { total, data: Vec::new() });
        let location = format!(
            "Location: http://127.0.0.1:{}/session/{}\r\n",
            port,
            rec.sessions.len() - 1
        );
        respond(&mut stream, "200 OK", &location, "");
        return;
    }

    let Some(idx) = path
        .strip_prefix("/session/")
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|i| *i < rec.sessions.len())
    else {
        respond(&mut stream, "404 Not Found", "", "");
        return;
    };
    let content_range = header(&head, "content-range").unwrap_or("").to_string();
    rec.content_ranges.push(content_range.clone());
    let session = &mut rec.sessions[idx];

    // Chunk: "bytes a-b/total"; status query: "bytes */total".
    if let Some((range, _)) = content_range
        .strip_prefix("bytes ")
        .and_then(|r| r.split_once('/'))
    {
        if let Some((a, _)) = range.split_once('-') {
            if a.parse::<u64>().ok() == Some(session.data.len() as u64) {
                session.data.extend_from_slice(&body);
            }
        }
    }
    if session.data.len() as u64 == session.total {
        respond(&mut stream, "200 OK", "", &format!(r#"{{"id":"remote-{}"}}"#, idx));
    } else if session.data.is_empty() {
        respond(&mut stream, "308 Resume Incomplete", "", "");
    } else {
        let range = format!("Range: bytes=0-{}\r\n", session.data.len() - 1);
        respond(&mut stream, "308 Resume Incomplete", &range, "");
    }
}

/// Playlist listing is paged one entry per page so paging gets exercised.
fn playlist_api(method: &str, path: &str, body: &[u8], rec: &mut Recorded) -> (&'static str, String) {
    let (route, query) = path.split_once('?').unwrap_or((path, ""));
    let request: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    match (method, route) {
        ("GET", "/api/playlists") => {
            rec.playlist_lists += 1;
            let page: usize = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("pageToken="))
                .and_then(|t| t.strip_prefix("page"))
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            let items: Vec<_> = rec
                .playlists
                .iter()
                .skip(page)
                .take(1)
                .map(|(id, title)| serde_json::json!({ "id": id, "snippet": { "title": title } }))
                .collect();
            let mut reply = serde_json::json!({ "items": items });
            if page + 1 < rec.playlists.len() {
                reply["nextPageToken"] = serde_json::json!(format!("page{}", page + 1));
            }
            ("200 OK", reply.to_string())
        }
        ("POST", "/api/playlists") => {
            let title = request
                .pointer("/snippet/title")
                .and_then(|t| t.as_str())
                .unwrap_or("")
                .to_string();
            let id = format!("PL{}", rec.playlists.len());
            rec.playlists.push((id.clone(), title.clone()));
            rec.playlist_creates.push(title);
            ("200 OK", serde_json::json!({ "id": id }).to_string())
        }
        ("POST", "/api/playlistItems") => {
            let field = |p: &str| request.pointer(p).and_then(|v| v.as_str()).unwrap_or("").to_string();
            let playlist = field("/snippet/playlistId");
            if !rec.playlists.iter().any(|(id, _)| *id == playlist) {
                return ("404 Not Found", r#"{"error":{"code":404,"message":"playlist not found"}}"#.into());
            }
            rec.playlist_items.push((playlist, field("/snippet/resourceId/videoId")));
            ("200 OK", r#"{"id":"item"}"#.into())
        }
        _ => ("404 Not Found", String::new()),
    }
}
