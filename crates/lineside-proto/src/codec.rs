//! Length-prefixed line framing.
//!
//! Each line is written as a 2-byte big-endian byte count followed by the
//! UTF-8 text. Peers of the lineside module frame their sockets the same way,
//! so lines can be exchanged without any delimiter scanning.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::ProtocolError;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest line that fits behind the prefix.
pub const MAX_LINE_LEN: usize = u16::MAX as usize;

/// Encode one line with its length prefix.
pub fn encode_line(line: &str) -> Result<BytesMut, ProtocolError> {
    let len = u16::try_from(line.len()).map_err(|_| ProtocolError::LineTooLong(line.len()))?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + line.len());
    buf.put_u16(len);
    buf.put_slice(line.as_bytes());
    Ok(buf)
}

/// Write one line and flush it.
pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode_line(line).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Read one line.
///
/// A clean end of stream surfaces as [`io::ErrorKind::UnexpectedEof`]; text
/// that is not UTF-8 as [`io::ErrorKind::InvalidData`].
pub async fn read_line<R>(reader: &mut R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u16().await?;
    let mut buf = vec![0u8; usize::from(len)];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
