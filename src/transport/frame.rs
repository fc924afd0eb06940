//! # Length-Prefixed Frame I/O
//!
//! Every transport flavour exchanges exactly one logical message per
//! `send`/`recv` call, framed as a 4-byte little-endian length prefix
//! followed by that many payload bytes. This is factored out of the
//! teacher's `TcpSocketTransport::read_message`/`write_message` — the
//! framing is pure byte-count bookkeeping, independent of what the
//! collectives layer has already encoded into the payload.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::TransportError;

/// Frames larger than this are rejected rather than trusted, matching the
/// teacher's 16 MiB cap on a single IPC message.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Read one length-prefixed frame from `stream`.
pub async fn read_frame<S>(stream: &mut S) -> Result<Vec<u8>, TransportError>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    stream
        .read_exact(&mut len_bytes)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => TransportError::ConnectionClosed,
            _ => TransportError::Io(e),
        })?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge { len });
    }

    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => TransportError::ConnectionClosed,
        _ => TransportError::Io(e),
    })?;
    Ok(payload)
}

/// Write one length-prefixed frame to `stream` and flush it.
pub async fn write_frame<S>(stream: &mut S, payload: &[u8]) -> Result<(), TransportError>
where
    S: tokio::io::AsyncWrite + Unpin,
{
    let len = payload.len() as u32;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge { len });
    }
    stream.write_all(&len.to_le_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}
