use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use super::PayloadItem;
use crate::protocol::SendError;

/// Frames response body writes as chunks.
///
/// An empty chunk writes nothing: a zero-size chunk on the wire would
/// terminate the body early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
    trailers: Vec<(String, String)>,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false, trailers: Vec::new() }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }

    /// Queues a trailer field, written after the last chunk. Returns `false`
    /// once the body has been terminated.
    pub fn push_trailer(&mut self, name: String, value: String) -> bool {
        if self.eof {
            return false;
        }
        self.trailers.push((name, value));
        true
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<PayloadItem> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            warn!("body write after the last chunk, ignored");
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(bytes) if bytes.is_empty() => Ok(()),
            PayloadItem::Chunk(bytes) => {
                let size_line = format!("{:x}\r\n", bytes.len());
                dst.reserve(size_line.len() + bytes.len() + 2);
                dst.put_slice(size_line.as_bytes());
                dst.put_slice(&bytes);
                dst.put_slice(b"\r\n");
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.put_slice(b"0\r\n");
                for (name, value) in self.trailers.drain(..) {
                    dst.put_slice(name.as_bytes());
                    dst.put_slice(b": ");
                    dst.put_slice(value.as_bytes());
                    dst.put_slice(b"\r\n");
                }
                dst.put_slice(b"\r\n");
                Ok(())
            }
        }
    }
}
