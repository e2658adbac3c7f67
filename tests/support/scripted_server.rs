//! A raw TCP HTTP/1.1 server for behavior wiremock cannot produce: bodies cut
//! off mid-stream and bodies delivered in timed segments.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::socket_guard::sockets_available;

/// Bytes written for one request, with `pause` between segments.
pub struct Reply {
    pub segments: Vec<Vec<u8>>,
    pub pause: Duration,
}

impl Reply {
    /// A full response with the given status line, headers and body.
    ///
    /// `Content-Length` is taken from `declared_len`, so a shorter `body`
    /// makes the connection close before the promised length arrives.
    pub fn new(status: &str, headers: &[(&str, String)], declared_len: usize, body: &[u8]) -> Self {
        let mut head = format!("HTTP/1.1 {status}\r\nContent-Length: {declared_len}\r\nConnection: close\r\n");
        for (name, value) in headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body);
        Self {
            segments: vec![bytes],
            pause: Duration::ZERO,
        }
    }

    /// A `200` carrying all of `body`.
    pub fn ok(body: &[u8]) -> Self {
        Self::new("200 OK", &[], body.len(), body)
    }

    /// A `200` that promises `declared_len` bytes but sends only `body`.
    pub fn truncated(declared_len: usize, body: &[u8]) -> Self {
        Self::new("200 OK", &[], declared_len, body)
    }

    /// A `206` for `body` starting at `start` of a `complete`-byte file.
    pub fn partial(start: usize, complete: usize, body: &[u8]) -> Self {
        let end = start + body.len() - 1;
        Self::new(
            "206 Partial Content",
            &[("Content-Range", format!("bytes {start}-{end}/{complete}"))],
            body.len(),
            body,
        )
    }

    /// A `200` whose body is sent in `chunk`-byte segments `pause` apart.
    pub fn paced(body: &[u8], chunk: usize, pause: Duration) -> Self {
        let head = Self::new("200 OK", &[], body.len(), &[]);
        let mut segments = head.segments;
        segments.extend(body.chunks(chunk).map(<[u8]>::to_vec));
        Self { segments, pause }
    }
}

/// A running server. Requests are answered one connection at a time.
pub struct ScriptedServer {
    base: String,
    ranges: Arc<Mutex<Vec<Option<String>>>>,
    task: JoinHandle<()>,
}

impl ScriptedServer {
    /// Starts a server that answers the `n`th request (0-indexed) with
    /// `reply(n, range_header)`. Returns `None` when sockets are unavailable.
    pub async fn start<F>(reply: F) -> Option<Self>
    where
        F: Fn(usize, Option<&str>) -> Reply + Send + Sync + 'static,
    {
        if !sockets_available() {
            return None;
        }
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind scripted server");
        let addr = listener.local_addr().expect("scripted server address");
        let ranges = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&ranges);

        let task = tokio::spawn(async move {
            let mut served = 0;
            while let Ok((mut socket, _)) = listener.accept().await {
                let Some(head) = read_head(&mut socket).await else {
                    continue;
                };
                let range = range_header(&head);
                seen.lock().expect("ranges lock").push(range.clone());
                let Reply { segments, pause } = reply(served, range.as_deref());
                served += 1;
                for (index, segment) in segments.iter().enumerate() {
                    if index > 0 && !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    if socket.write_all(segment).await.is_err() {
                        break;
                    }
                    let _ = socket.flush().await;
                }
                let _ = socket.shutdown().await;
            }
        });

        Some(Self {
            base: format!("http://{addr}"),
            ranges,
            task,
        })
    }

    /// URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// The `Range` header of every request received so far, in order.
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.ranges.lock().expect("ranges lock").clone()
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];
    while !buf.windows(4).any(|window| window == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 || buf.len() > 64 * 1024 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

fn range_header(head: &str) -> Option<String> {
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("range")
            .then(|| value.trim().to_string())
    })
}
