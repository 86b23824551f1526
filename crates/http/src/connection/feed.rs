//! Socket byte feeds.
//!
//! [`ReadFeed`] accumulates inbound bytes for the parser. [`WriteFeed`] owns
//! the pending response bytes and the encoder producing them; a partial
//! socket write leaves the remainder queued and the next flush resumes from
//! there.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::{ResponseEncoder, ResponseItem};
use crate::protocol::{ConnectionError, SendError};

#[derive(Debug)]
pub struct ReadFeed<R> {
    reader: R,
    buffer: BytesMut,
    capacity: usize,
}

impl<R> ReadFeed<R>
where
    R: AsyncRead + Unpin,
{
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self { reader, buffer: BytesMut::with_capacity(capacity), capacity }
    }

    /// Reads whatever bytes are available, waiting until at least one arrives.
    ///
    /// A peer that closed its side yields [`ConnectionError::UnexpectedEof`].
    pub async fn fill(&mut self) -> Result<usize, ConnectionError> {
        self.buffer.reserve(self.capacity);
        let n = self.reader.read_buf(&mut self.buffer).await.map_err(ConnectionError::from_read)?;
        if n == 0 {
            return Err(ConnectionError::UnexpectedEof);
        }
        trace!(read = n, buffered = self.buffer.len(), "read from socket");
        Ok(n)
    }

    #[inline]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops the first `n` buffered bytes, which the parser has consumed.
    pub fn consume(&mut self, n: usize) {
        self.buffer.advance(n);
    }
}

#[derive(Debug)]
pub struct WriteFeed<W> {
    writer: W,
    pending: BytesMut,
    encoder: ResponseEncoder,
}

impl<W> WriteFeed<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        Self { writer, pending: BytesMut::with_capacity(capacity), encoder: ResponseEncoder::new() }
    }

    /// Encodes `item` into the pending buffer without touching the socket.
    #[inline]
    pub fn write(&mut self, item: ResponseItem) -> Result<(), SendError> {
        self.encoder.encode(item, &mut self.pending)
    }

    /// Writes the pending bytes until none are left.
    pub async fn flush(&mut self) -> Result<(), SendError> {
        while self.pending.has_remaining() {
            let n = self.writer.write_buf(&mut self.pending).await?;
            if n == 0 {
                return Err(SendError::io(std::io::ErrorKind::WriteZero));
            }
            trace!(written = n, pending = self.pending.len(), "wrote to socket");
        }
        Ok(self.writer.flush().await?)
    }

    /// Throws away bytes that were not written yet.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Prepares the encoder for the next response.
    pub fn next_response(&mut self) {
        self.encoder.reset();
    }
}
