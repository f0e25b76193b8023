//! Length-prefixed frames on a gossip stream.
//!
//! ```text
//! [length:u32 BE][envelope JSON: length bytes]
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{GossipError, GossipResult};

/// Default upper bound on a single frame's payload.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Reads one frame. Returns `None` when the peer closed the stream cleanly
/// between frames.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> GossipResult<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > max_frame_bytes {
        return Err(GossipError::FrameTooLarge {
            len,
            max: max_frame_bytes,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Bytes::from(payload)))
}

/// Writes one frame and flushes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> GossipResult<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| GossipError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
