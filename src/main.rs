//! Main entry point for the rread CLI application.
//!
//! Reads a byte range of a remote file through [`HttpRandomReader`] and
//! writes it to stdout or a file.

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

use rread::{Cli, HttpRandomReader, format_size};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if !cli.is_http_url() {
        bail!("Not an HTTP(S) URL: {}", cli.url);
    }

    let reader = HttpRandomReader::with_options(cli.url.clone(), cli.options());
    let resource = reader
        .resource()
        .await
        .with_context(|| format!("Failed to open {}", cli.url))?
        .clone();

    if cli.head {
        println!("{}\t{}\t{}", resource.size, format_size(resource.size), resource.url);
        return Ok(());
    }

    let copied = match &cli.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path))?;
            copy_range(&reader, &cli, &mut file).await?
        }
        None => copy_range(&reader, &cli, &mut tokio::io::stdout()).await?,
    };

    reader.close().await;

    if !cli.quiet {
        eprintln!(
            "\n{} read, {} transferred, {} seek(s)",
            format_size(copied),
            format_size(reader.transferred_bytes()),
            reader.seek_count()
        );
    }

    Ok(())
}

/// Copy `[offset, offset + length)` to `out` in `chunk`-sized sequential reads.
async fn copy_range<W: AsyncWrite + Unpin>(
    reader: &HttpRandomReader,
    cli: &Cli,
    out: &mut W,
) -> Result<u64> {
    let mut buf = vec![0u8; cli.chunk.max(1)];
    let mut offset = cli.offset;
    let end = cli.length.map_or(u64::MAX, |len| offset.saturating_add(len));

    while offset < end {
        let want = ((end - offset).min(buf.len() as u64)) as usize;
        let n = reader
            .read(&mut buf[..want], offset)
            .await
            .with_context(|| format!("Read failed at offset {}", offset))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).await?;
        offset += n as u64;
    }

    out.flush().await?;
    Ok(offset - cli.offset)
}
