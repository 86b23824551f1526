use bytes::BytesMut;
use tokio_util::codec::Encoder;

use super::PayloadItem;
use super::chunked_encoder::ChunkedEncoder;
use super::length_encoder::LengthEncoder;
use crate::protocol::{SendError, TransferEncoding};

/// Response body encoder selected from the response head's transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthEncoder),
    Chunked(ChunkedEncoder),
}

impl PayloadEncoder {
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(size)) }
    }

    pub fn is_finish(&self) -> bool {
        match &self.kind {
            Kind::Length(encoder) => encoder.is_finish(),
            Kind::Chunked(encoder) => encoder.is_finish(),
        }
    }

    /// Queues a trailer field; only chunked bodies can carry trailers.
    pub fn push_trailer(&mut self, name: String, value: String) -> bool {
        match &mut self.kind {
            Kind::Chunked(encoder) => encoder.push_trailer(name, value),
            Kind::Length(_) => false,
        }
    }
}

impl From<TransferEncoding> for PayloadEncoder {
    fn from(encoding: TransferEncoding) -> Self {
        match encoding {
            TransferEncoding::Identity(length) => Self::fix_length(length),
            TransferEncoding::Chunked => Self::chunked(),
        }
    }
}

impl Encoder<PayloadItem> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
        }
    }
}
