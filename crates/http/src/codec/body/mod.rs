//! Body framing for requests and responses.
//!
//! # Decoders
//! - [`ChunkedDecoder`](chunked_decoder::ChunkedDecoder): `Transfer-Encoding: chunked` request bodies
//! - [`LengthDecoder`](length_decoder::LengthDecoder): `Content-Length` request bodies
//! - [`PayloadDecoder`]: picks one of the above from the parsed head
//!
//! # Encoders
//! - [`ChunkedEncoder`](chunked_encoder::ChunkedEncoder): frames response writes as chunks
//! - [`LengthEncoder`](length_encoder::LengthEncoder): passes identity bodies through, capped at the declared length
//! - [`PayloadEncoder`]: picks one of the above from the response's transfer encoding
//!
//! All of them are incremental: they accept whatever bytes are available and
//! keep their position across calls.

use bytes::Bytes;

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub(crate) use payload_decoder::PayloadDecoder;
pub(crate) use payload_encoder::PayloadEncoder;

/// An item of a body stream flowing through the body codecs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    /// A chunk of body data
    Chunk(Bytes),
    /// End of the body
    Eof,
}

/// How a request body is framed, derived from its headers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Body with a known length in bytes
    Length(u64),
    /// Body using chunked transfer encoding
    Chunked,
    /// No body
    Empty,
}
