use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use bytes::{Buf, Bytes};
use tokio::sync::Notify;

/// Ordered byte queue: append at the tail, consume from the head.
///
/// Chunks are kept as received; nothing is copied until [`copy_out`](Self::copy_out).
#[derive(Debug, Default)]
pub struct ReadBuffer {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of readable bytes held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a chunk at the tail and return the new length.
    pub fn append(&mut self, chunk: Bytes) -> usize {
        if !chunk.is_empty() {
            self.len += chunk.len();
            self.chunks.push_back(chunk);
        }
        self.len
    }

    /// Drop `n` bytes from the head.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`len`](Self::len).
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.len,
            "consume({}) past end of buffer ({} bytes)",
            n,
            self.len
        );

        let mut remaining = n;
        while remaining > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                self.chunks.pop_front();
            } else {
                front.advance(remaining);
                remaining = 0;
            }
        }
        self.len -= n;
    }

    /// Copy the first `n` bytes into `dst` without consuming them.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`len`](Self::len) or `dst.len()`.
    pub fn copy_out(&self, dst: &mut [u8], n: usize) {
        assert!(n <= self.len, "copy_out({}) past end of buffer ({} bytes)", n, self.len);

        let mut written = 0;
        for chunk in &self.chunks {
            if written == n {
                break;
            }
            let take = chunk.len().min(n - written);
            dst[written..written + take].copy_from_slice(&chunk[..take]);
            written += take;
        }
    }

    /// Consume everything.
    pub fn drain(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }
}

/// A [`ReadBuffer`] shared between the reader and the pump of the session
/// currently filling it, plus a wake-up for "a chunk (or the end) arrived".
///
/// The reader owns the buffer; a continuation session appends into the same
/// one, a seek replaces it.
#[derive(Debug, Default)]
pub struct SharedBuffer {
    inner: Mutex<ReadBuffer>,
    arrived: Notify,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ReadBuffer> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Wake the reader waiting in [`arrived`](Self::arrived).
    pub fn notify(&self) {
        // notify_one stores a permit when nobody waits yet, so a chunk landing
        // between the reader's length check and its await is not missed.
        self.arrived.notify_one();
    }

    /// Wait for the next [`notify`](Self::notify). May wake spuriously.
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }
}
