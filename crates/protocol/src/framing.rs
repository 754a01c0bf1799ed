//! Exact-byte-count transfer.
//!
//! Messages carry no length prefix: both peers agree on every layout size, so a transfer
//! either moves exactly the declared number of bytes or it failed. Interrupted calls are
//! retried; any other shortfall is reported as [`ProtocolError::ShortRead`] or
//! [`ProtocolError::ShortWrite`] so callers can tell a peer hang-up from an I/O fault.

use crate::{ProtocolError, ProtocolResult};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads until `buf` is full or the peer closes. Returns the number of bytes read.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Writes until `buf` is drained or the connection refuses more. Returns the number of
/// bytes written.
pub async fn write_full<W>(writer: &mut W, buf: &[u8]) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]).await {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

/// Fills `buf` completely.
///
/// # Errors
///
/// Returns `ProtocolError::ShortRead` if the peer closed early, or `ProtocolError::Io`.
pub async fn read_exactly<R>(reader: &mut R, buf: &mut [u8]) -> ProtocolResult<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let received = read_full(reader, buf).await?;
    if received < buf.len() {
        return Err(ProtocolError::ShortRead {
            expected: buf.len(),
            received,
        });
    }
    Ok(())
}

/// Reads exactly `len` bytes into a fresh buffer.
pub async fn read_vec<R>(reader: &mut R, len: usize) -> ProtocolResult<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; len];
    read_exactly(reader, &mut buf).await?;
    Ok(buf)
}

pub async fn read_byte<R>(reader: &mut R) -> ProtocolResult<u8>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut byte = [0u8; 1];
    read_exactly(reader, &mut byte).await?;
    Ok(byte[0])
}

/// Writes all of `buf` and flushes.
///
/// # Errors
///
/// Returns `ProtocolError::ShortWrite` if the connection stopped accepting bytes, or
/// `ProtocolError::Io`.
pub async fn write_exactly<W>(writer: &mut W, buf: &[u8]) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let written = write_full(writer, buf).await?;
    if written < buf.len() {
        return Err(ProtocolError::ShortWrite {
            expected: buf.len(),
            written,
        });
    }
    writer.flush().await?;
    Ok(())
}

pub async fn write_byte<W>(writer: &mut W, byte: u8) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_exactly(writer, &[byte]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, ReadBuf};

    #[tokio::test]
    async fn test_read_exactly_across_partial_writes() {
        let (mut client, mut server) = duplex(4);

        let writer = tokio::spawn(async move {
            write_exactly(&mut client, b"0123456789").await.unwrap();
        });

        let mut buf = [0u8; 10];
        read_exactly(&mut server, &mut buf).await.unwrap();
        writer.await.unwrap();

        assert_eq!(&buf, b"0123456789");
    }

    #[tokio::test]
    async fn test_peer_close_is_short_read() {
        let (mut client, mut server) = duplex(64);
        write_exactly(&mut client, b"abc").await.unwrap();
        drop(client);

        let err = read_vec(&mut server, 17).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortRead {
                expected: 17,
                received: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_read_byte_on_closed_stream() {
        let (client, mut server) = duplex(8);
        drop(client);

        let err = read_byte(&mut server).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortRead {
                expected: 1,
                received: 0
            }
        ));
    }

    /// Reader that fails with `Interrupted` on every other poll.
    struct Flaky {
        data: Vec<u8>,
        interrupt_next: bool,
    }

    impl AsyncRead for Flaky {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Poll::Ready(Err(io::ErrorKind::Interrupted.into()));
            }
            self.interrupt_next = true;
            if let Some(byte) = self.data.first().copied() {
                self.data.remove(0);
                buf.put_slice(&[byte]);
            }
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_interrupted_reads_are_retried() {
        let mut reader = Flaky {
            data: b"gp".to_vec(),
            interrupt_next: true,
        };

        let mut buf = [0u8; 2];
        read_exactly(&mut reader, &mut buf).await.unwrap();
        assert_eq!(&buf, b"gp");
    }

    /// Writer that accepts nothing.
    struct Full;

    impl AsyncWrite for Full {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(0))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_zero_length_write_is_short_write() {
        let err = write_exactly(&mut Full, b"0").await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortWrite {
                expected: 1,
                written: 0
            }
        ));
    }
}
