use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;
use tracing::{debug, warn};

use crate::codec::body::{PayloadEncoder, PayloadItem};
use crate::codec::header::{HeaderEncoder, Persistence};
use crate::protocol::{Headers, ResponseHead, SendError};

/// One write operation against a response, in the order the application issued it.
#[derive(Debug)]
pub enum ResponseItem {
    /// interim `100 Continue` with optional extra headers
    Continue(Headers),
    Head(ResponseHead, Persistence),
    Body(Bytes),
    Trailer(String, String),
    End,
}

impl ResponseItem {
    pub fn operation(&self) -> &'static str {
        match self {
            ResponseItem::Continue(_) => "write_continue",
            ResponseItem::Head(..) => "write_response",
            ResponseItem::Body(_) => "write_body",
            ResponseItem::Trailer(..) => "write_trailer",
            ResponseItem::End => "done",
        }
    }
}

/// Serializes one response at a time.
///
/// A second head for the same response is ignored. Body, trailer and end
/// items before the head fail with [`SendError::WriteBeforeHeaders`] and
/// write nothing.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    payload_encoder: Option<PayloadEncoder>,
    head_written: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn is_head_written(&self) -> bool {
        self.head_written
    }

    /// Whether the current response has been terminated.
    pub fn is_finished(&self) -> bool {
        self.payload_encoder.as_ref().is_some_and(PayloadEncoder::is_finish)
    }

    /// Prepares for the next response on the same connection.
    pub fn reset(&mut self) {
        self.payload_encoder = None;
        self.head_written = false;
    }

    fn body_encoder(&mut self, operation: &'static str) -> Result<&mut PayloadEncoder, SendError> {
        self.payload_encoder.as_mut().ok_or(SendError::WriteBeforeHeaders { operation })
    }
}

impl Encoder<ResponseItem> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: ResponseItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            ResponseItem::Continue(headers) => {
                if self.head_written {
                    warn!("100 Continue after the final response head, ignored");
                    return Ok(());
                }
                dst.put_slice(b"HTTP/1.1 100 Continue\r\n");
                for (name, value) in headers.iter() {
                    dst.put_slice(name.as_bytes());
                    dst.put_slice(b": ");
                    dst.put_slice(value.as_bytes());
                    dst.put_slice(b"\r\n");
                }
                dst.put_slice(b"\r\n");
                Ok(())
            }
            ResponseItem::Head(head, persistence) => {
                if self.head_written {
                    debug!(status = %head.status, "response head already written, ignored");
                    return Ok(());
                }
                self.payload_encoder = Some(PayloadEncoder::from(head.transfer_encoding));
                self.head_written = true;
                HeaderEncoder.encode((head, persistence), dst)
            }
            ResponseItem::Body(bytes) => self.body_encoder("write_body")?.encode(PayloadItem::Chunk(bytes), dst),
            ResponseItem::Trailer(name, value) => {
                let encoder = self.body_encoder("write_trailer")?;
                if !encoder.push_trailer(name, value) {
                    warn!("trailer on a response that cannot carry one, ignored");
                }
                Ok(())
            }
            ResponseItem::End => self.body_encoder("done")?.encode(PayloadItem::Eof, dst),
        }
    }
}
