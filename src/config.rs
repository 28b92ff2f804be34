//! Reader configuration.

use std::time::Duration;

/// Default high watermark: read-ahead pauses once this many bytes are buffered (20 MiB).
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 20 * 1024 * 1024;

/// Default low watermark: a paused stream is resumed at or below this level (5 MiB).
pub const DEFAULT_MIN_BUFFER_BYTES: usize = 5 * 1024 * 1024;

/// Default stale-pause threshold.
///
/// Resuming a stream that sat paused for minutes has been seen to replay a few
/// MiB of duplicated bytes before ending, so such a stream is reopened instead.
pub const DEFAULT_MAX_SLEEP: Duration = Duration::from_secs(60);

/// Default timeout for connecting and for receiving response headers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for [`HttpRandomReader`](crate::HttpRandomReader).
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// High watermark for the read-ahead buffer.
    pub max_buffer_bytes: usize,
    /// Low watermark for the read-ahead buffer.
    pub min_buffer_bytes: usize,
    /// A stream paused for longer than this is destroyed rather than resumed.
    pub max_sleep: Duration,
    /// Connect timeout used by the default transport.
    pub timeout: Duration,
    /// Custom User-Agent header for the default transport.
    pub user_agent: Option<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            min_buffer_bytes: DEFAULT_MIN_BUFFER_BYTES,
            max_sleep: DEFAULT_MAX_SLEEP,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }
}

impl ReaderOptions {
    pub fn with_max_buffer_bytes(mut self, bytes: usize) -> Self {
        self.max_buffer_bytes = bytes;
        self
    }

    pub fn with_min_buffer_bytes(mut self, bytes: usize) -> Self {
        self.min_buffer_bytes = bytes;
        self
    }

    pub fn with_max_sleep(mut self, max_sleep: Duration) -> Self {
        self.max_sleep = max_sleep;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Clamp the low watermark so it never sits above the high one.
    pub(crate) fn normalized(mut self) -> Self {
        if self.min_buffer_bytes > self.max_buffer_bytes {
            self.min_buffer_bytes = self.max_buffer_bytes;
        }
        self
    }
}
