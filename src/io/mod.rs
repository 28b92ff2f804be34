mod buffer;
mod http;
mod session;

pub use buffer::{ReadBuffer, SharedBuffer};
pub use http::HttpRandomReader;
pub use session::{Resume, Session};

use crate::error::Result;
use async_trait::async_trait;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` only
    /// at the end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    async fn size(&self) -> Result<u64>;
}
