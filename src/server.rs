// src/server.rs - TCP front end: one task per connection, one reply per line
use crate::dispatch::{Dispatcher, ERROR_PREFIX};
use crate::error::Error;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Longest request line accepted, `\n` excluded.
pub const MAX_LINE_LEN: usize = 1024;

/// Accept connections until `shutdown` resolves.
///
/// Connections already being served keep running on their own tasks; the
/// session lock keeps their commands from interleaving.
pub async fn serve<F>(listener: TcpListener, dispatcher: Dispatcher, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    tracing::info!("Listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                tracing::info!("Client connected: {}", peer);
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher).await {
                        tracing::warn!("Connection {} ended with error: {}", peer, e);
                    }
                    tracing::info!("Client disconnected: {}", peer);
                });
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, no longer accepting connections");
                return Ok(());
            }
        }
    }
}

/// Serve one client: read a line, dispatch it, write the reply.
///
/// Returns when the peer closes the connection. Command errors, lines that
/// are not valid UTF-8 and lines longer than [`MAX_LINE_LEN`] are answered
/// with `ERROR:` replies and never end the loop.
pub async fn handle_connection<S>(stream: S, dispatcher: Dispatcher) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_LINE_LEN as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            break;
        }

        let mut reply = if line.len() > MAX_LINE_LEN && line.last() != Some(&b'\n') {
            skip_line(&mut reader).await?;
            let e = Error::InvalidArgument(format!("line longer than {} bytes", MAX_LINE_LEN));
            tracing::debug!("Rejected request: {}", e);
            format!("{}{}", ERROR_PREFIX, e)
        } else {
            dispatcher.dispatch(String::from_utf8_lossy(&line).trim()).await
        };
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Drop input up to and including the next newline, or until EOF.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        let read = (&mut *reader)
            .take(MAX_LINE_LEN as u64)
            .read_until(b'\n', &mut scratch)
            .await?;
        if read == 0 || scratch.last() == Some(&b'\n') {
            return Ok(());
        }
    }
}
