//! Error types for remote random-access reads.

use thiserror::Error;

/// Result type for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors that can occur while probing or reading a remote resource.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The metadata probe (HEAD) did not return 200.
    #[error("Resource unavailable: HEAD returned status {status}")]
    ResourceUnavailable {
        /// HTTP status code
        status: u16,
    },

    /// The server does not advertise `Accept-Ranges: bytes`.
    #[error("Remote does not accept byte ranges")]
    RangeUnsupported,

    /// A ranged GET did not answer with 206 Partial Content.
    #[error("Invalid partial request response: status {status}")]
    PartialRequestFailed {
        /// HTTP status code
        status: u16,
    },

    /// A 206 answer whose `Content-Range` starts somewhere other than asked.
    #[error("Partial response starts at {served}, requested {requested}")]
    RangeMismatch {
        /// First byte asked for
        requested: u64,
        /// First byte the server sent
        served: u64,
    },

    /// A ranged response ended cleanly without delivering a single byte,
    /// although the resource extends past `offset`.
    #[error("Ranged response at {offset} ended without data")]
    EmptyResponse {
        /// Where the response was supposed to start
        offset: u64,
    },

    /// The metadata probe carried no usable `Content-Length`.
    #[error("Remote server did not return Content-Length")]
    MissingContentLength,

    /// Network failure surfaced from the HTTP client.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// I/O failure surfaced from a non-reqwest transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The read was interrupted because the reader was closed.
    #[error("Reader closed while a read was in flight")]
    Closed,
}

impl ReaderError {
    /// Whether this error came from the network layer rather than from the
    /// server's answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, ReaderError::Transport(_) | ReaderError::Io(_))
    }
}
