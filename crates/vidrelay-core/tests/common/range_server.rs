//! Minimal HTTP/1.1 media server: HEAD and Range GET over one static body.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Answer this many GETs with 503 before serving normally.
    pub fail_first_gets: usize,
    /// Answer every GET with this status instead of the body.
    pub fixed_status: Option<u16>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            fail_first_gets: 0,
            fixed_status: None,
        }
    }
}

pub struct RangeServer {
    pub url: String,
    gets: Arc<AtomicUsize>,
}

impl RangeServer {
    /// GET requests received so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Serve `body` from a background thread until the process exits.
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&gets);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &body, opts, &counter));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/media/clip.mp4", port),
        gets,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions, gets: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;
    let accept = if opts.support_ranges { "Accept-Ranges: bytes\r\n" } else { "" };

    if method == "HEAD" {
        let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n", total, accept);
        let _ = stream.write_all(head.as_bytes());
        return;
    }
    if method != "GET" {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let seen = gets.fetch_add(1, Ordering::SeqCst);
    if let Some(code) = opts.fixed_status {
        let resp = format!("HTTP/1.1 {} Nope\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", code);
        let _ = stream.write_all(resp.as_bytes());
        return;
    }
    if seen < opts.fail_first_gets {
        let _ = stream.write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let (status, slice, content_range) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) if start < total => {
            let end_excl = end_incl.saturating_add(1).min(total);
            (
                "206 Partial Content",
                &body[start as usize..end_excl as usize],
                format!("Content-Range: bytes {}-{}/{}\r\n", start, end_excl - 1, total),
            )
        }
        Some(_) => (
            "416 Range Not Satisfiable",
            &body[0..0],
            format!("Content-Range: bytes */{}\r\n", total),
        ),
        None => ("200 OK", body, String::new()),
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        content_range,
        accept
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(slice);
}

/// Method and `(start, end_inclusive)` of a `Range: bytes=a-b` header.
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let range = lines
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("range"))
        .and_then(|(_, v)| {
            let (a, b) = v.trim().strip_prefix("bytes=")?.split_once('-')?;
            let start = a.trim().parse().ok()?;
            let end = if b.trim().is_empty() { u64::MAX } else { b.trim().parse().ok()? };
            Some((start, end))
        });
    (method, range)
}
