//! HTTP plumbing behind the reader.
//!
//! [`Transport`] is the raw capability the reader needs from an HTTP stack: a
//! metadata probe and a ranged fetch whose body arrives as a stream of byte
//! chunks. [`ReqwestTransport`] is the default implementation. On top of it,
//! [`ConnectionManager`] enforces the status and header rules (200 for HEAD,
//! `Accept-Ranges: bytes`, 206 for ranged GETs) and turns responses into
//! [`RemoteResource`] metadata and [`ByteSource`] streams.

mod client;
mod manager;

pub use client::ReqwestTransport;
pub use manager::{ConnectionManager, RemoteResource};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::error::Result;

/// Body of a ranged response, delivered chunk by chunk.
///
/// Pulling from the stream is "flowing"; not pulling is "paused" and leaves
/// backpressure to the transport.
pub type ByteSource = BoxStream<'static, Result<Bytes>>;

/// Inclusive byte range for a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte
    pub start: u64,
    /// Last byte (inclusive)
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Value for the `Range` header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Status and headers of a HEAD response.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Status, headers and body of a ranged GET.
pub struct RangeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteSource,
}

impl std::fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Raw HTTP capabilities used by [`ConnectionManager`].
///
/// Implementations report whatever the server answered; status validation
/// happens one layer up.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a HEAD request.
    async fn head(&self, url: &str) -> Result<HeadResponse>;

    /// Issue a GET carrying `Range: bytes=start-end`.
    async fn get_range(&self, url: &str, range: ByteRange) -> Result<RangeResponse>;

    /// Release pooled connections. Later requests may open new ones.
    fn shutdown(&self);
}
