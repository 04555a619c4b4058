//! 通道帧的编解码。
//! Encoding and decoding of channel frames.
//!
//! A channel carries a sequence of frames, each one a 4-byte big-endian length
//! followed by that many payload bytes.

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const HEADER_LEN: usize = 4;

/// 将一个帧编码到缓冲区。
/// Encodes one frame into a buffer.
pub fn encode<B: BufMut>(payload: &[u8], buf: &mut B) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(())
}

/// 从读取器解码一个帧。
/// Reads one frame from `reader`.
///
/// A clean end of stream, or one in the middle of a frame, is reported as
/// [`Error::ConnectionClosed`]. A length above `max_len` is rejected before
/// any payload is read.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await.map_err(closed_on_eof)? as usize;
    if len > max_len {
        return Err(Error::FrameTooLarge { len, max: max_len });
    }

    let mut payload = BytesMut::zeroed(len);
    reader.read_exact(&mut payload).await.map_err(closed_on_eof)?;
    Ok(payload.freeze())
}

fn closed_on_eof(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        Error::Io(e)
    }
}
