//! One in-flight ranged response and its flow control.
//!
//! A session spawns a pump task that pulls chunks from the response body and
//! appends them to the reader's [`SharedBuffer`]. Pausing means the pump
//! stops pulling, which leaves backpressure to the transport.
//!
//! ```text
//! Flowing --(buffer >= max)--> Paused --(resume)--> Flowing
//!    |                            |
//!    +--(end / error)--> Ended <--+--(resume after max_sleep)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::buffer::SharedBuffer;
use crate::error::ReaderError;
use crate::net::ByteSource;
use crate::size::format_size;

/// Outcome of [`Session::resume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// The session was paused and is flowing again.
    Resumed,
    /// Nothing to do: already flowing, or already ended.
    Unchanged,
    /// The session had been paused longer than `max_sleep` and was destroyed.
    Stale,
}

#[derive(Debug, Default)]
struct FlowState {
    paused_at: Option<Instant>,
    ended: bool,
    /// Body bytes pulled so far.
    received: u64,
    failure: Option<ReaderError>,
}

#[derive(Debug, Default)]
struct FlowControl {
    state: Mutex<FlowState>,
    resumed: Notify,
}

impl FlowControl {
    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pause(&self) {
        let mut state = self.lock();
        if state.paused_at.is_none() && !state.ended {
            state.paused_at = Some(Instant::now());
        }
    }

    fn record(&self, n: usize) {
        self.lock().received += n as u64;
    }

    fn finish(&self, failure: Option<ReaderError>) {
        let mut state = self.lock();
        state.ended = true;
        state.paused_at = None;
        state.failure = failure;
    }

    async fn wait_flowing(&self) {
        loop {
            if self.lock().paused_at.is_none() {
                return;
            }
            self.resumed.notified().await;
        }
    }
}

/// A live ranged response feeding a [`SharedBuffer`].
#[derive(Debug)]
pub struct Session {
    flow: Arc<FlowControl>,
    pump: JoinHandle<()>,
    max_sleep: Duration,
}

impl Session {
    /// Start pumping `body` into `buffer`. Must be called within a tokio runtime.
    pub fn start(
        body: ByteSource,
        buffer: Arc<SharedBuffer>,
        max_buffer_bytes: usize,
        max_sleep: Duration,
        transferred: Arc<AtomicU64>,
    ) -> Self {
        let flow = Arc::new(FlowControl::default());
        let pump = tokio::spawn(pump(
            body,
            buffer,
            Arc::clone(&flow),
            max_buffer_bytes,
            transferred,
        ));

        Self {
            flow,
            pump,
            max_sleep,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.flow.lock().paused_at.is_some()
    }

    /// True once the body finished, failed, or the session was destroyed.
    pub fn is_ended(&self) -> bool {
        self.flow.lock().ended
    }

    /// Body bytes this session appended to the buffer.
    pub fn received(&self) -> u64 {
        self.flow.lock().received
    }

    #[cfg(test)]
    fn paused_for(&self) -> Option<Duration> {
        self.flow.lock().paused_at.map(|at| at.elapsed())
    }

    pub fn has_failure(&self) -> bool {
        self.flow.lock().failure.is_some()
    }

    /// Take the transport error that ended this session, if any.
    pub fn take_failure(&self) -> Option<ReaderError> {
        self.flow.lock().failure.take()
    }

    /// Let the pump pull again.
    ///
    /// A session paused for longer than `max_sleep` is destroyed instead:
    /// resuming such a stream can replay bytes already delivered.
    pub fn resume(&self) -> Resume {
        let mut state = self.flow.lock();
        let Some(paused_at) = state.paused_at else {
            return Resume::Unchanged;
        };

        if paused_at.elapsed() > self.max_sleep {
            state.paused_at = None;
            state.ended = true;
            drop(state);
            self.pump.abort();
            return Resume::Stale;
        }

        state.paused_at = None;
        drop(state);
        self.flow.resumed.notify_one();
        Resume::Resumed
    }

    /// Stop the pump and mark the session ended. Buffered bytes stay put.
    pub fn destroy(&self) {
        self.pump.abort();
        let mut state = self.flow.lock();
        state.ended = true;
        state.paused_at = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(
    mut body: ByteSource,
    buffer: Arc<SharedBuffer>,
    flow: Arc<FlowControl>,
    max_buffer_bytes: usize,
    transferred: Arc<AtomicU64>,
) {
    loop {
        flow.wait_flowing().await;

        match body.next().await {
            Some(Ok(chunk)) => {
                transferred.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                flow.record(chunk.len());
                let len = buffer.lock().append(chunk);
                if len >= max_buffer_bytes {
                    flow.pause();
                    info!("Slowing stream, buffer at {}", format_size(len as u64));
                }
                buffer.notify();
            }
            Some(Err(err)) => {
                warn!("Stream failed: {}", err);
                flow.finish(Some(err));
                buffer.notify();
                return;
            }
            None => {
                info!("Reaching end of stream");
                flow.finish(None);
                buffer.notify();
                return;
            }
        }
    }
}
