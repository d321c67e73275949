// ============================================
// File: crates/peerlink-transport/src/frame.rs
// ============================================
//! # Length-Prefixed Framing
//!
//! ## Creation Reason
//! TCP is a byte stream; peers exchange discrete messages. Every message
//! is sent as one frame.
//!
//! ## Wire Format
//! ```text
//! ┌───────────────────┬─────────────────────────┐
//! │ length (u32, BE)  │ body (length bytes)     │
//! └───────────────────┴─────────────────────────┘
//! ```
//!
//! ## Main Functionality
//! - `read_frame`: reads one frame; oversized bodies are drained and
//!   reported instead of tearing the stream down
//! - `write_frame`: writes header and body in a single buffer
//!
//! ## ⚠️ Important Note for Next Developer
//! - EOF before the first header byte is a clean close (`ReadOutcome::Closed`)
//! - EOF anywhere else is `ConnectionClosed`
//! - Draining keeps the stream aligned on frame boundaries
//!
//! ## Last Modified
//! v0.1.0 - Initial framing implementation

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Result, TransportError};

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

// ============================================
// ReadOutcome
// ============================================

/// Result of reading one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete frame body.
    Frame(Bytes),
    /// A frame above the limit; its body was read and discarded.
    Oversized {
        /// Announced body length.
        len: usize,
    },
    /// The peer closed the stream between frames.
    Closed,
}

// ============================================
// Read / Write
// ============================================

/// Reads one frame whose body may be at most `max_len` bytes.
///
/// # Errors
/// - `ConnectionClosed` if the stream ends inside a frame
/// - `Io` on socket errors
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<ReadOutcome>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; LENGTH_PREFIX_SIZE];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_SIZE {
        let n = reader
            .read(&mut header[filled..])
            .await
            .map_err(|e| TransportError::io("reading frame header", e))?;
        if n == 0 {
            if filled == 0 {
                return Ok(ReadOutcome::Closed);
            }
            return Err(TransportError::closed("length prefix"));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;

    if len > max_len {
        let mut limited = (&mut *reader).take(len as u64);
        let drained = tokio::io::copy(&mut limited, &mut tokio::io::sink())
            .await
            .map_err(|e| TransportError::io("draining oversized frame", e))?;
        if drained < len as u64 {
            return Err(TransportError::closed("oversized frame body"));
        }
        trace!(len, max_len, "drained oversized frame");
        return Ok(ReadOutcome::Oversized { len });
    }

    let mut body = BytesMut::zeroed(len);
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::closed("frame body")
        } else {
            TransportError::io("reading frame body", e)
        }
    })?;

    Ok(ReadOutcome::Frame(body.freeze()))
}

/// Writes `body` as one frame and flushes.
///
/// # Errors
/// - `FrameTooLarge` if `body` exceeds `max_len`
/// - `Io` on socket errors
pub async fn write_frame<W>(writer: &mut W, body: &[u8], max_len: usize) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if body.len() > max_len {
        return Err(TransportError::FrameTooLarge {
            len: body.len(),
            max: max_len,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| TransportError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    buf.put_u32(len);
    buf.put_slice(body);

    writer
        .write_all(&buf)
        .await
        .map_err(|e| TransportError::io("writing frame", e))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::io("flushing frame", e))?;
    Ok(())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frames_in_sequence() {
        let (mut a, mut b) = duplex(1024);
        write_frame(&mut a, b"first", 64).await.unwrap();
        write_frame(&mut a, b"", 64).await.unwrap();
        write_frame(&mut a, b"third", 64).await.unwrap();

        assert_eq!(
            read_frame(&mut b, 64).await.unwrap(),
            ReadOutcome::Frame(Bytes::from_static(b"first"))
        );
        assert_eq!(read_frame(&mut b, 64).await.unwrap(), ReadOutcome::Frame(Bytes::new()));
        assert_eq!(
            read_frame(&mut b, 64).await.unwrap(),
            ReadOutcome::Frame(Bytes::from_static(b"third"))
        );
    }

    #[tokio::test]
    async fn test_header_is_big_endian() {
        let (mut a, mut b) = duplex(64);
        write_frame(&mut a, &[7u8; 3], 64).await.unwrap();
        let mut raw = [0u8; 7];
        b.read_exact(&mut raw).await.unwrap();
        assert_eq!(raw, [0, 0, 0, 3, 7, 7, 7]);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_drained() {
        let (mut a, mut b) = duplex(4096);
        write_frame(&mut a, &[1u8; 100], 1024).await.unwrap();
        write_frame(&mut a, b"ok", 1024).await.unwrap();

        assert_eq!(read_frame(&mut b, 16).await.unwrap(), ReadOutcome::Oversized { len: 100 });
        assert_eq!(
            read_frame(&mut b, 16).await.unwrap(),
            ReadOutcome::Frame(Bytes::from_static(b"ok"))
        );
    }

    #[tokio::test]
    async fn test_write_rejects_oversized() {
        let (mut a, _b) = duplex(64);
        let err = write_frame(&mut a, &[0u8; 10], 8).await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { len: 10, max: 8 }));
    }

    #[tokio::test]
    async fn test_clean_and_dirty_eof() {
        let (a, mut b) = duplex(64);
        drop(a);
        assert_eq!(read_frame(&mut b, 64).await.unwrap(), ReadOutcome::Closed);

        let (mut a, mut b) = duplex(64);
        a.write_all(&[0, 0]).await.unwrap();
        drop(a);
        assert!(matches!(
            read_frame(&mut b, 64).await,
            Err(TransportError::ConnectionClosed { .. })
        ));

        let (mut a, mut b) = duplex(64);
        a.write_all(&[0, 0, 0, 9, 1, 2]).await.unwrap();
        drop(a);
        assert!(matches!(
            read_frame(&mut b, 64).await,
            Err(TransportError::ConnectionClosed { .. })
        ));
    }
}
