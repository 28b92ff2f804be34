use clap::Parser;
use std::time::Duration;

use crate::config::{DEFAULT_MAX_BUFFER_BYTES, DEFAULT_MIN_BUFFER_BYTES, ReaderOptions};

#[derive(Parser, Debug)]
#[command(name = "rread")]
#[command(version)]
#[command(about = "Read byte ranges of a remote file over HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  rread https://example.com/video.mp4 -s 1048576 -n 4096 | xxd   dump 4 KiB at 1 MiB\n  \
  rread --head https://example.com/archive.zip                   show size only\n  \
  rread https://example.com/big.iso -o big.iso -v                fetch sequentially with logs")]
pub struct Cli {
    /// HTTP or HTTPS URL
    #[arg(value_name = "URL")]
    pub url: String,

    /// Start offset in bytes
    #[arg(short = 's', long, default_value_t = 0)]
    pub offset: u64,

    /// Number of bytes to read (default: to the end)
    #[arg(short = 'n', long)]
    pub length: Option<u64>,

    /// Size of each sequential read
    #[arg(short = 'c', long, value_name = "BYTES", default_value_t = 64 * 1024)]
    pub chunk: usize,

    /// Write to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<String>,

    /// Only probe the resource and print its size
    #[arg(long)]
    pub head: bool,

    /// Pause read-ahead once this many bytes are buffered
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_BUFFER_BYTES)]
    pub max_buffer: usize,

    /// Resume read-ahead at or below this many buffered bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MIN_BUFFER_BYTES)]
    pub min_buffer: usize,

    /// Reopen instead of resuming a stream paused longer than this
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub max_sleep: u64,

    /// Connect and response-header timeout
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Verbose logging (-v => info, -vv => debug)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode, no statistics
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    pub fn options(&self) -> ReaderOptions {
        ReaderOptions::default()
            .with_max_buffer_bytes(self.max_buffer)
            .with_min_buffer_bytes(self.min_buffer)
            .with_max_sleep(Duration::from_secs(self.max_sleep))
            .with_timeout(Duration::from_secs(self.timeout))
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
