use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use super::PayloadItem;
use crate::protocol::SendError;
use crate::utils::ensure;

/// Writes an identity body, never exceeding the declared `Content-Length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl Encoder<PayloadItem> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(bytes) => {
                if bytes.is_empty() {
                    return Ok(());
                }
                let len = self.remaining.min(bytes.len() as u64) as usize;
                if len < bytes.len() {
                    warn!(
                        dropped = bytes.len() - len,
                        "body write exceeds the declared content-length, truncated"
                    );
                }
                dst.put_slice(&bytes[..len]);
                self.remaining -= len as u64;
                Ok(())
            }
            PayloadItem::Eof => {
                let missing = if self.eof { 0 } else { self.remaining };
                self.eof = true;
                ensure!(
                    missing == 0,
                    SendError::invalid_body(format!("response finished {missing} bytes short of its content-length"))
                );
                Ok(())
            }
        }
    }
}
