//! Minimal HTTP/1.1 server implementing the speed-probe endpoints for
//! integration tests.
//!
//! Serves `GET /__down?bytes=N` with an N-byte body and `POST /__up` by
//! consuming the request body. Runs until the process exits.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeServerOptions {
    /// Respond 500 to this many requests before serving normally.
    pub fail_first: usize,
}

/// Starts a server in a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345"). The server runs until the process exits.
pub fn start() -> String {
    start_with_options(ProbeServerOptions::default())
}

/// Like `start` but allows customizing server behavior (initial failures).
pub fn start_with_options(opts: ProbeServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let served = Arc::new(AtomicUsize::new(0));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let served = Arc::clone(&served);
            thread::spawn(move || handle(stream, opts, &served));
        }
    });
    format!("http://127.0.0.1:{port}")
}

fn handle(mut stream: TcpStream, opts: ProbeServerOptions, served: &AtomicUsize) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find_header_end(&buf) {
                    break pos;
                }
                if buf.len() > 64 * 1024 {
                    return;
                }
            }
            Err(_) => return,
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = match lines.next() {
        Some(line) => line.to_string(),
        None => return,
    };
    let mut content_length = 0usize;
    let mut expects_continue = false;
    for line in lines {
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
        if lower.starts_with("expect:") && lower.contains("100-continue") {
            expects_continue = true;
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");

    if served.fetch_add(1, Ordering::SeqCst) < opts.fail_first {
        if method == "POST" {
            consume_body(&mut stream, &buf, header_end, content_length, expects_continue);
        }
        let _ = stream.write_all(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }

    match method {
        "GET" if target.starts_with("/__down") => {
            let bytes = target
                .split_once("bytes=")
                .and_then(|(_, value)| value.parse::<usize>().ok())
                .unwrap_or(0);
            let header =
                format!("HTTP/1.1 200 OK\r\nContent-Length: {bytes}\r\nConnection: close\r\n\r\n");
            if stream.write_all(header.as_bytes()).is_err() {
                return;
            }
            let body = [0u8; 16 * 1024];
            let mut remaining = bytes;
            while remaining > 0 {
                let n = remaining.min(body.len());
                if stream.write_all(&body[..n]).is_err() {
                    return;
                }
                remaining -= n;
            }
        }
        "POST" if target.starts_with("/__up") => {
            consume_body(&mut stream, &buf, header_end, content_length, expects_continue);
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        }
        _ => {
            let _ = stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn consume_body(
    stream: &mut TcpStream,
    buf: &[u8],
    header_end: usize,
    content_length: usize,
    expects_continue: bool,
) {
    if expects_continue {
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
    }
    let mut received = buf.len() - header_end;
    let mut chunk = [0u8; 16 * 1024];
    while received < content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => received += n,
        }
    }
}
