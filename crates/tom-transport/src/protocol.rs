use crate::node::TransportStats;
use crate::TomTransportError;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Write a length-prefixed frame.
pub(crate) async fn write_framed<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> std::io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame exceeds u32 length")
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await
}

/// Read one length-prefixed frame, rejecting frames above `max_size`.
pub(crate) async fn read_framed<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_size: usize,
) -> Result<Vec<u8>, TomTransportError> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(TomTransportError::Receive)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(TomTransportError::MessageTooLarge {
            size: len,
            max: max_size,
        });
    }

    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(TomTransportError::Receive)?;

    Ok(buf)
}

/// State shared by the accept loop and its connection handlers.
pub(crate) struct HandlerState {
    pub incoming_tx: mpsc::Sender<(SocketAddr, Vec<u8>)>,
    pub max_message_size: usize,
    pub io_timeout: Duration,
    pub permits: Arc<Semaphore>,
    pub stats: Arc<TransportStats>,
}

/// Accept connections until cancelled. Dropping the listener on exit
/// closes the listening socket.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    state: Arc<HandlerState>,
    cancel: CancellationToken,
) {
    loop {
        let (stream, remote) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("accept failed: {e}");
                    // Avoid spinning on persistent errors (fd exhaustion).
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            },
        };

        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = state.permits.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        let state = state.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _permit = permit;
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = handle_connection(stream, remote, &state) => {}
            }
        });
    }

    tracing::debug!("accept loop stopped");
}

/// Read exactly one frame, hand it off, close.
///
/// The hand-off happens before the close: senders treat EOF as the
/// acknowledgement that the frame reached the inbound channel.
async fn handle_connection(mut stream: TcpStream, remote: SocketAddr, state: &HandlerState) {
    let read = read_framed(&mut stream, state.max_message_size);
    let frame = match tokio::time::timeout(state.io_timeout, read).await {
        Ok(Ok(frame)) => frame,
        Ok(Err(e)) => {
            state.stats.frames_rejected.inc();
            tracing::warn!(%remote, "dropping inbound connection: {e}");
            return;
        }
        Err(_) => {
            state.stats.frames_rejected.inc();
            tracing::warn!(%remote, "dropping inbound connection: read timed out");
            return;
        }
    };

    state.stats.frames_received.inc();
    tracing::trace!(%remote, len = frame.len(), "frame received");

    if state.incoming_tx.send((remote, frame)).await.is_err() {
        return;
    }
    let _ = stream.shutdown().await;
}
