use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use reqwest::header::RANGE;
use tracing::debug;

use super::{ByteRange, HeadResponse, RangeResponse, Transport};
use crate::config::ReaderOptions;
use crate::error::{ReaderError, Result};

/// [`Transport`] backed by a private keep-alive `reqwest` client.
///
/// The client (and with it the connection pool) is built lazily and dropped
/// by [`Transport::shutdown`], so each reader owns its own pool rather than
/// sharing a global one.
pub struct ReqwestTransport {
    options: ReaderOptions,
    client: Mutex<Option<Client>>,
}

impl ReqwestTransport {
    pub fn new(options: &ReaderOptions) -> Self {
        Self {
            options: options.clone(),
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<Client> {
        let mut slot = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        // No overall request timeout: a ranged body may legitimately stay
        // open (paused) for a long time.
        let user_agent = self
            .options
            .user_agent
            .clone()
            .unwrap_or_else(|| concat!("rread/", env!("CARGO_PKG_VERSION")).to_string());
        let client = Client::builder()
            .connect_timeout(self.options.timeout)
            .pool_idle_timeout(None)
            .user_agent(user_agent)
            .build()?;

        *slot = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn head(&self, url: &str) -> Result<HeadResponse> {
        let client = self.client()?;
        let resp = tokio::time::timeout(self.options.timeout, client.head(url).send())
            .await
            .map_err(|_| timed_out("HEAD", url))??;

        Ok(HeadResponse {
            status: resp.status(),
            headers: resp.headers().clone(),
        })
    }

    async fn get_range(&self, url: &str, range: ByteRange) -> Result<RangeResponse> {
        let client = self.client()?;
        let request = client.get(url).header(RANGE, range.header_value());
        let resp = tokio::time::timeout(self.options.timeout, request.send())
            .await
            .map_err(|_| timed_out("GET", url))??;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes_stream().map_err(ReaderError::from).boxed();

        Ok(RangeResponse {
            status,
            headers,
            body,
        })
    }

    fn shutdown(&self) {
        let mut slot = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            debug!("Dropped connection pool");
        }
    }
}

fn timed_out(method: &str, url: &str) -> ReaderError {
    ReaderError::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("{} {} timed out waiting for response headers", method, url),
    ))
}
