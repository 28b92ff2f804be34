//! # rread
//!
//! Seekable random-access reads over a remote HTTP resource, using byte-range
//! requests instead of downloading the whole file.
//!
//! [`HttpRandomReader`] gives `pread(offset, length)` semantics on top of a
//! single long-lived ranged GET. It keeps a bounded read-ahead buffer, so
//! sequential reads and short forward skips are served without opening a new
//! connection; only a read outside the buffered window reopens the stream.
//!
//! ## Features
//!
//! - Lazy HEAD probe (size and `Accept-Ranges` check), shared by concurrent first reads
//! - Read-ahead with high/low watermarks and transport backpressure
//! - Transparent continuation when a stream ends early
//! - Stale-pause protection: long-paused streams are reopened, not resumed
//! - Private keep-alive connection pool per reader, released on [`close`](HttpRandomReader::close)
//!
//! ## Example
//!
//! ```no_run
//! use rread::HttpRandomReader;
//!
//! #[tokio::main]
//! async fn main() -> rread::Result<()> {
//!     let reader = HttpRandomReader::new("https://example.com/video.mp4");
//!
//!     let mut buf = vec![0u8; 4096];
//!     let n = reader.read(&mut buf, 1_000_000).await?;
//!     println!("read {} bytes, {} seek(s)", n, reader.seek_count());
//!
//!     reader.close().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod net;
pub mod size;

pub use cli::Cli;
pub use config::ReaderOptions;
pub use error::{ReaderError, Result};
pub use io::{HttpRandomReader, ReadAt};
pub use net::{ByteRange, ByteSource, HeadResponse, RangeResponse, RemoteResource, Transport};
pub use size::format_size;
