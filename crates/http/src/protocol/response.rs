//! HTTP response head handling.
//!
//! A [`ResponseHead`] is built by the application handler and consumed
//! exactly once by `ResponseWriter::write_response`.

use http::StatusCode;

use crate::protocol::{Headers, HttpVersion};

/// How the response body is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferEncoding {
    /// A body of exactly this many bytes, announced with `Content-Length`
    Identity(u64),
    /// A body framed with `Transfer-Encoding: chunked`
    Chunked,
}

impl TransferEncoding {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, TransferEncoding::Chunked)
    }
}

/// The head of an HTTP response: status line, framing and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: HttpVersion,
    pub status: StatusCode,
    pub transfer_encoding: TransferEncoding,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn new(status: StatusCode, transfer_encoding: TransferEncoding) -> Self {
        Self { version: HttpVersion::HTTP_11, status, transfer_encoding, headers: Headers::new() }
    }

    /// Shorthand for a response with an empty identity body.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, TransferEncoding::Identity(0))
    }

    pub fn with_version(mut self, version: HttpVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}
