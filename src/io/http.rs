use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OnceCell, watch};
use tracing::{debug, info};

use super::ReadAt;
use super::buffer::SharedBuffer;
use super::session::{Resume, Session};
use crate::config::ReaderOptions;
use crate::error::{ReaderError, Result};
use crate::net::{ConnectionManager, RemoteResource, ReqwestTransport, Transport};
use crate::size::format_size;

/// The buffer and the session currently feeding it.
///
/// The buffer belongs to the reader: a continuation swaps the session and
/// keeps the buffer, a seek replaces both.
struct Active {
    buffer: Arc<SharedBuffer>,
    session: Session,
}

#[derive(Default)]
struct ReaderState {
    /// Resource offset of the first buffered byte. `None` until the first seek.
    remote_pos: Option<u64>,
    active: Option<Active>,
}

impl ReaderState {
    /// Turn a short forward seek into a skip inside the buffered window.
    fn skip_ahead(&mut self, offset: u64) -> bool {
        let (Some(pos), Some(active)) = (self.remote_pos, self.active.as_ref()) else {
            return false;
        };
        if offset <= pos {
            return false;
        }

        let shift = offset - pos;
        let mut buffer = active.buffer.lock();
        if (buffer.len() as u64) < shift {
            return false;
        }
        buffer.consume(shift as usize);
        drop(buffer);

        self.remote_pos = Some(offset);
        true
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            active.session.destroy();
            active.buffer.lock().drain();
        }
        self.remote_pos = None;
    }
}

/// Seekable reader over a remote HTTP resource.
///
/// Reads are served from a single ranged GET kept open across calls.
/// Sequential reads, and forward reads that land inside the read-ahead
/// window, never open a new connection; anything else counts as a seek and
/// reopens the stream at the requested offset.
///
/// One read runs at a time: overlapping calls queue behind an internal mutex.
pub struct HttpRandomReader {
    url: String,
    options: ReaderOptions,
    connections: ConnectionManager,
    resource: OnceCell<RemoteResource>,
    state: Mutex<ReaderState>,
    seeks: AtomicU64,
    transferred: Arc<AtomicU64>,
    closed: watch::Sender<u64>,
}

impl HttpRandomReader {
    /// Create a reader with default options. No request is sent until the
    /// first read.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_options(url, ReaderOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: ReaderOptions) -> Self {
        let transport = Arc::new(ReqwestTransport::new(&options));
        Self::with_transport(url, options, transport)
    }

    /// Create a reader over a custom [`Transport`].
    pub fn with_transport(
        url: impl Into<String>,
        options: ReaderOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (closed, _) = watch::channel(0);
        Self {
            url: url.into(),
            options: options.normalized(),
            connections: ConnectionManager::new(transport),
            resource: OnceCell::new(),
            state: Mutex::new(ReaderState::default()),
            seeks: AtomicU64::new(0),
            transferred: Arc::new(AtomicU64::new(0)),
            closed,
        }
    }

    /// Create a reader and probe the resource right away.
    ///
    /// This sends a HEAD request to verify range support and get the size.
    pub async fn open(url: impl Into<String>, options: ReaderOptions) -> Result<Self> {
        let reader = Self::with_options(url, options);
        reader.resource().await?;
        Ok(reader)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Resource metadata, if the probe already ran.
    pub fn metadata(&self) -> Option<&RemoteResource> {
        self.resource.get()
    }

    /// Number of times a new stream had to be opened at a different offset.
    pub fn seek_count(&self) -> u64 {
        self.seeks.load(Ordering::Relaxed)
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Bytes currently held in the read-ahead buffer. Waits for an
    /// in-flight read to finish.
    pub async fn buffered_len(&self) -> usize {
        let state = self.state.lock().await;
        state.active.as_ref().map_or(0, |a| a.buffer.len())
    }

    /// Probe the resource once; concurrent callers share the in-flight probe.
    pub async fn resource(&self) -> Result<&RemoteResource> {
        self.resource
            .get_or_try_init(|| self.connections.probe(&self.url))
            .await
    }

    /// Size of the resource in bytes. Probes on first use.
    pub async fn size(&self) -> Result<u64> {
        Ok(self.resource().await?.size)
    }

    /// Read up to `dst.len()` bytes at `offset`.
    ///
    /// Returns 0 past the end of the resource, and fewer bytes than asked only
    /// when the request runs past the end.
    pub async fn read(&self, dst: &mut [u8], offset: u64) -> Result<usize> {
        let size = self.size().await?;

        let mut state = self.state.lock().await;
        let mut closed = self.closed.subscribe();

        if offset >= size || dst.is_empty() {
            return Ok(0);
        }
        let len = (dst.len() as u64).min(size - offset) as usize;

        let active = match self.fill(&mut state, &mut closed, offset, len, size).await {
            Ok(active) => active,
            Err(err) => {
                state.teardown();
                return Err(err);
            }
        };

        {
            let mut buffer = active.lock();
            buffer.copy_out(dst, len);
            buffer.consume(len);
        }
        state.remote_pos = Some(offset + len as u64);

        Ok(len)
    }

    /// Position the stream at `offset` and wait until `len` bytes are buffered.
    async fn fill(
        &self,
        state: &mut ReaderState,
        closed: &mut watch::Receiver<u64>,
        offset: u64,
        len: usize,
        size: u64,
    ) -> Result<Arc<SharedBuffer>> {
        let seeking = state.remote_pos != Some(offset) && !state.skip_ahead(offset);

        let active = match state.active.as_mut() {
            Some(active) if !seeking => active,
            _ => {
                if state.active.is_some() {
                    info!(
                        "Should kill current seek (remote_pos {:?}, offset {})",
                        state.remote_pos, offset
                    );
                }
                state.teardown();

                self.seeks.fetch_add(1, Ordering::Relaxed);
                info!("Reading (seeking) at {}", offset);
                let buffer = Arc::new(SharedBuffer::new());
                let session = self.open_session(offset, size, &buffer).await?;

                state.remote_pos = Some(offset);
                state.active.insert(Active { buffer, session })
            }
        };

        self.continue_if_ended(active, offset, size).await?;

        debug!(
            "Reading {} bytes at {} (buffer {}, {})",
            len,
            offset,
            format_size(active.buffer.len() as u64),
            if active.session.is_paused() {
                "paused"
            } else {
                "flowing"
            }
        );

        if active.buffer.len() <= self.options.min_buffer_bytes && active.session.is_paused() {
            info!(
                "Restart buffering at {} (buffer {})",
                offset,
                format_size(active.buffer.len() as u64)
            );
            if active.session.resume() == Resume::Stale {
                info!("Stream paused for too long, dropping it");
            }
        }

        while active.buffer.len() < len {
            if active.session.is_ended() {
                if let Some(err) = active.session.take_failure() {
                    return Err(err);
                }
                self.continue_if_ended(active, offset, size).await?;
                continue;
            }

            if active.session.resume() == Resume::Stale {
                info!("Stream paused for too long, dropping it");
                continue;
            }

            tokio::select! {
                _ = active.buffer.arrived() => {}
                _ = closed.changed() => return Err(ReaderError::Closed),
            }
        }

        Ok(Arc::clone(&active.buffer))
    }

    /// Reopen a stream that ended before the end of the resource, right after
    /// the last buffered byte. Buffered bytes are kept; this is not a seek.
    ///
    /// A stream that ended without delivering anything is not reopened: the
    /// read fails with [`ReaderError::EmptyResponse`].
    async fn continue_if_ended(&self, active: &mut Active, offset: u64, size: u64) -> Result<()> {
        if !active.session.is_ended() || active.session.has_failure() {
            return Ok(());
        }

        let buffered = active.buffer.len() as u64;
        let from = offset + buffered;
        if from >= size {
            return Ok(());
        }
        // Nothing arrived, so reopening at the same offset cannot progress.
        if active.session.received() == 0 {
            return Err(ReaderError::EmptyResponse { offset: from });
        }

        info!("Re-open at {} (buffer {})", from, format_size(buffered));
        active.session = self.open_session(from, size, &active.buffer).await?;
        Ok(())
    }

    async fn open_session(
        &self,
        from: u64,
        size: u64,
        buffer: &Arc<SharedBuffer>,
    ) -> Result<Session> {
        let body = self.connections.ranged_get(&self.url, from, size - 1).await?;
        Ok(Session::start(
            body,
            Arc::clone(buffer),
            self.options.max_buffer_bytes,
            self.options.max_sleep,
            Arc::clone(&self.transferred),
        ))
    }

    /// Tear down the stream, the buffer and the connection pool.
    ///
    /// A read waiting for data fails with [`ReaderError::Closed`]. The reader
    /// stays usable: the next read reopens everything and counts as a seek.
    /// Calling this repeatedly is harmless.
    pub async fn close(&self) {
        self.closed.send_modify(|generation| *generation += 1);

        let mut state = self.state.lock().await;
        if state.active.is_some() {
            info!("Closing {}", self.url);
        }
        state.teardown();
        self.connections.close();
    }
}

#[async_trait]
impl ReadAt for HttpRandomReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.read(buf, offset).await
    }

    async fn size(&self) -> Result<u64> {
        HttpRandomReader::size(self).await
    }
}
