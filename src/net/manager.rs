use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, HeaderMap};
use tracing::{debug, info};

use super::{ByteRange, ByteSource, HeadResponse, Transport};
use crate::error::{ReaderError, Result};

/// Metadata learned from the HEAD probe. Immutable once known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub url: String,
    pub size: u64,
    pub supports_ranges: bool,
}

impl RemoteResource {
    /// Build metadata from a validated HEAD response.
    pub fn from_head(url: &str, head: &HeadResponse) -> Result<Self> {
        let size = head
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
            .ok_or(ReaderError::MissingContentLength)?;

        Ok(Self {
            url: url.to_string(),
            size,
            supports_ranges: accepts_byte_ranges(&head.headers),
        })
    }
}

fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("bytes"))
        .unwrap_or(false)
}

/// First byte of a `Content-Range: bytes start-end/total` header.
fn content_range_start(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)?
        .to_str()
        .ok()?
        .trim()
        .strip_prefix("bytes ")?
        .split_once('-')?
        .0
        .trim()
        .parse()
        .ok()
}

/// Issues the probe and ranged fetches for one reader, validating answers.
#[derive(Clone)]
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// HEAD the resource. Requires status 200 and `Accept-Ranges: bytes`.
    pub async fn head(&self, url: &str) -> Result<HeadResponse> {
        info!("Opening {}", url);
        let head = self.transport.head(url).await?;

        if head.status != StatusCode::OK {
            return Err(ReaderError::ResourceUnavailable {
                status: head.status.as_u16(),
            });
        }
        if !accepts_byte_ranges(&head.headers) {
            return Err(ReaderError::RangeUnsupported);
        }

        Ok(head)
    }

    /// Probe the resource and parse its metadata.
    pub async fn probe(&self, url: &str) -> Result<RemoteResource> {
        let head = self.head(url).await?;
        RemoteResource::from_head(url, &head)
    }

    /// GET `from..=to`. Requires status 206, and a `Content-Range` starting
    /// at `from` when the server sends one.
    pub async fn ranged_get(&self, url: &str, from: u64, to: u64) -> Result<ByteSource> {
        let range = ByteRange::new(from, to);
        debug!("Requesting {} of {}", range.header_value(), url);
        let resp = self.transport.get_range(url, range).await?;

        if resp.status != StatusCode::PARTIAL_CONTENT {
            return Err(ReaderError::PartialRequestFailed {
                status: resp.status.as_u16(),
            });
        }
        if let Some(served) = content_range_start(&resp.headers)
            && served != from
        {
            return Err(ReaderError::RangeMismatch {
                requested: from,
                served,
            });
        }

        Ok(resp.body)
    }

    /// Release pooled connections. Safe to call repeatedly.
    pub fn close(&self) {
        self.transport.shutdown();
    }
}
