//! Bidirectional byte splice between an inbound and a backend stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const COPY_BUFFER: usize = 16 * 1024;

/// Bytes moved in each direction, and what the splice did to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpliceSummary {
    pub client_to_backend: u64,
    pub backend_to_client: u64,
    /// We sent FIN on the backend stream; it must not be reused.
    pub backend_write_closed: bool,
}

impl SpliceSummary {
    /// Whether the backend stream can serve another client.
    pub fn backend_reusable(&self) -> bool {
        !self.backend_write_closed
    }
}

/// Copy both directions concurrently and return once both have finished.
///
/// Each direction runs until its source reaches EOF or errors, then shuts
/// down the opposite write half so the peer sees the close. Copy errors end
/// that direction only; they are logged and never surfaced. Byte counts
/// include everything written before an error.
pub async fn splice(inbound: &mut TcpStream, backend: &mut TcpStream) -> SpliceSummary {
    let (mut client_read, mut client_write) = inbound.split();
    let (mut backend_read, mut backend_write) = backend.split();

    let (upstream, downstream) = tokio::join!(
        pipe(&mut client_read, &mut backend_write, "client_to_backend"),
        pipe(&mut backend_read, &mut client_write, "backend_to_client"),
    );

    SpliceSummary {
        client_to_backend: upstream.copied,
        backend_to_client: downstream.copied,
        backend_write_closed: upstream.writer_closed,
    }
}

struct PipeReport {
    copied: u64,
    /// Shutdown was issued on the writer, whether or not it succeeded.
    writer_closed: bool,
}

async fn pipe<R, W>(reader: &mut R, writer: &mut W, direction: &'static str) -> PipeReport
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(direction, copied, error = %e, "Read ended with error");
                break;
            }
        };
        if let Err(e) = writer.write_all(&buf[..n]).await {
            tracing::debug!(direction, copied, error = %e, "Write ended with error");
            break;
        }
        copied += n as u64;
    }

    if let Err(e) = writer.shutdown().await {
        tracing::trace!(direction, error = %e, "Half-close failed");
    }
    PipeReport {
        copied,
        writer_closed: true,
    }
}
