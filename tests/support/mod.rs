//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, HeaderValue};
use rread::{
    ByteRange, ByteSource, HeadResponse, RangeResponse, ReaderError, Result, Transport,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Deterministic pseudo-random content.
pub fn fixture(len: usize, seed: u64) -> Bytes {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    Bytes::from(data)
}

/// In-memory [`Transport`] serving one resource, with knobs for the
/// misbehaviours the reader has to survive.
pub struct MemoryTransport {
    data: Bytes,
    chunk_size: usize,
    head_status: StatusCode,
    get_status: StatusCode,
    accept_ranges: Option<&'static str>,
    head_delay: Duration,
    truncate: Mutex<VecDeque<usize>>,
    truncate_all: Option<usize>,
    stall_after: Option<usize>,
    fail_after: Option<usize>,
    range_shift: u64,
    heads: AtomicUsize,
    shutdowns: AtomicUsize,
    gets: Mutex<Vec<ByteRange>>,
}

impl MemoryTransport {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            chunk_size: 16,
            head_status: StatusCode::OK,
            get_status: StatusCode::PARTIAL_CONTENT,
            accept_ranges: Some("bytes"),
            head_delay: Duration::ZERO,
            truncate: Mutex::new(VecDeque::new()),
            truncate_all: None,
            stall_after: None,
            fail_after: None,
            range_shift: 0,
            heads: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            gets: Mutex::new(Vec::new()),
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn head_status(mut self, status: StatusCode) -> Self {
        self.head_status = status;
        self
    }

    pub fn get_status(mut self, status: StatusCode) -> Self {
        self.get_status = status;
        self
    }

    pub fn accept_ranges(mut self, value: Option<&'static str>) -> Self {
        self.accept_ranges = value;
        self
    }

    pub fn head_delay(mut self, delay: Duration) -> Self {
        self.head_delay = delay;
        self
    }

    /// End the next response cleanly after `limit` bytes. Queued per GET.
    pub fn truncate_next(self, limit: usize) -> Self {
        self.truncate.lock().unwrap().push_back(limit);
        self
    }

    /// End every response cleanly after `limit` bytes.
    pub fn truncate_all(mut self, limit: usize) -> Self {
        self.truncate_all = Some(limit);
        self
    }

    /// Stop delivering (without ending) after `limit` bytes.
    pub fn stall_after(mut self, limit: usize) -> Self {
        self.stall_after = Some(limit);
        self
    }

    /// Fail the body with a connection reset after `limit` bytes.
    pub fn fail_after(mut self, limit: usize) -> Self {
        self.fail_after = Some(limit);
        self
    }

    /// Report a `Content-Range` starting `shift` bytes past the requested one.
    pub fn shift_content_range(mut self, shift: u64) -> Self {
        self.range_shift = shift;
        self
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn requested_ranges(&self) -> Vec<ByteRange> {
        self.gets.lock().unwrap().clone()
    }

    fn body(&self, range: ByteRange) -> ByteSource {
        let end = (range.end as usize + 1).min(self.data.len());
        let mut body = self.data.slice(range.start as usize..end);

        let limit = self
            .truncate
            .lock()
            .unwrap()
            .pop_front()
            .or(self.truncate_all)
            .or(self.stall_after)
            .or(self.fail_after);
        if let Some(limit) = limit {
            body.truncate(limit);
        }

        let chunk_size = self.chunk_size.max(1);
        let chunks: Vec<Result<Bytes>> = (0..body.len())
            .step_by(chunk_size)
            .map(|at| Ok(body.slice(at..(at + chunk_size).min(body.len()))))
            .collect();

        let source = stream::iter(chunks).boxed();
        if self.stall_after.is_some() {
            source.chain(stream::pending()).boxed()
        } else if self.fail_after.is_some() {
            let reset = ReaderError::Io(std::io::ErrorKind::ConnectionReset.into());
            source.chain(stream::iter(vec![Err(reset)])).boxed()
        } else {
            source
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn head(&self, _url: &str) -> Result<HeadResponse> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        if !self.head_delay.is_zero() {
            tokio::time::sleep(self.head_delay).await;
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(self.data.len()));
        if let Some(value) = self.accept_ranges {
            headers.insert(ACCEPT_RANGES, HeaderValue::from_static(value));
        }

        Ok(HeadResponse {
            status: self.head_status,
            headers,
        })
    }

    async fn get_range(&self, _url: &str, range: ByteRange) -> Result<RangeResponse> {
        self.gets.lock().unwrap().push(range);

        let body = if self.get_status == StatusCode::PARTIAL_CONTENT {
            self.body(range)
        } else {
            stream::empty().boxed()
        };

        let mut headers = HeaderMap::new();
        let content_range = format!(
            "bytes {}-{}/{}",
            range.start + self.range_shift,
            range.end,
            self.data.len()
        );
        if let Ok(value) = HeaderValue::from_str(&content_range) {
            headers.insert(CONTENT_RANGE, value);
        }

        Ok(RangeResponse {
            status: self.get_status,
            headers,
            body,
        })
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// A file served by [`FixtureServer`].
#[derive(Clone)]
pub struct FixtureFile {
    pub data: Bytes,
    pub accept_ranges: bool,
}

impl FixtureFile {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            accept_ranges: true,
        }
    }

    pub fn without_ranges(mut self) -> Self {
        self.accept_ranges = false;
        self
    }
}

/// Minimal HTTP/1.1 server on 127.0.0.1 answering HEAD and ranged GET.
///
/// Every response closes its connection. With `max_body`, partial responses
/// are cut short (with a matching `Content-Length`), so clients see a clean
/// early end of stream.
pub struct FixtureServer {
    pub addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FixtureServer {
    pub async fn start(files: HashMap<&'static str, FixtureFile>, max_body: Option<usize>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let files = Arc::new(files);
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let files = Arc::clone(&files);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let _ = handle(socket, &files, max_body, &counter).await;
                });
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(
    mut socket: TcpStream,
    files: &HashMap<&'static str, FixtureFile>,
    max_body: Option<usize>,
    requests: &AtomicUsize,
) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut tmp = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            return Ok(());
        }
        head.extend_from_slice(&tmp[..n]);
    }
    requests.fetch_add(1, Ordering::SeqCst);

    let text = String::from_utf8_lossy(&head);
    let mut lines = text.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let range = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.eq_ignore_ascii_case("range").then(|| value.trim().to_string())
    });

    let Some(file) = files.get(path.as_str()) else {
        let resp = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        return socket.write_all(resp.as_bytes()).await;
    };

    let total = file.data.len();
    let ranges = if file.accept_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method == "HEAD" {
        let resp = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
            total, ranges
        );
        return socket.write_all(resp.as_bytes()).await;
    }

    let parsed = range
        .as_deref()
        .and_then(|r| r.strip_prefix("bytes="))
        .and_then(|r| r.split_once('-'))
        .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)));

    match parsed {
        Some((start, end)) if file.accept_ranges && start < total => {
            let end = end.min(total - 1);
            let mut body = file.data.slice(start..end + 1);
            if let Some(limit) = max_body {
                body.truncate(limit);
            }
            let resp = format!(
                "HTTP/1.1 206 Partial Content\r\n\
                 Content-Range: bytes {}-{}/{}\r\n\
                 Content-Length: {}\r\n\
                 {}Connection: close\r\n\r\n",
                start,
                end,
                total,
                body.len(),
                ranges
            );
            socket.write_all(resp.as_bytes()).await?;
            socket.write_all(&body).await
        }
        _ => {
            let resp = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
                total, ranges
            );
            socket.write_all(resp.as_bytes()).await?;
            socket.write_all(&file.data).await
        }
    }
}
