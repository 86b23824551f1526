//! Token-level scanning of HTTP/1.1 requests.
//!
//! A [`Tokenizer`] turns raw request bytes into a flat stream of [`Token`]s
//! and knows nothing about how they are assembled. [`HttpTokenizer`] scans
//! the head with [`HeaderDecoder`] once it is complete and streams the body
//! through a [`PayloadDecoder`] as bytes arrive.

use bytes::{Bytes, BytesMut};
use http::Method;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::{PayloadDecoder, PayloadItem};
use crate::codec::header::{HeaderDecoder, salvage};
use crate::protocol::{HttpVersion, ParseError};

/// Default limit for the request line plus header fields
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Default limit for the number of header fields
pub const DEFAULT_MAX_HEADERS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    MessageBegin,
    Url(&'a [u8]),
    HeaderField(&'a [u8]),
    HeaderValue(&'a [u8]),
    HeadersComplete { method: Method, version: HttpVersion },
    /// The head failed to scan. Preceded by the `Url` and header tokens that
    /// could still be recovered from it, and followed by the scan error.
    HeadAbandoned { method: Option<Method>, version: Option<HttpVersion> },
    Body(Bytes),
    MessageComplete,
}

/// Receives tokens; an error stops the scan and is returned from [`Tokenizer::execute`].
pub type TokenSink<'s> = dyn FnMut(Token<'_>) -> Result<(), ParseError> + 's;

pub trait Tokenizer: Send {
    /// Scans `input` and reports tokens to `sink`, returning how many bytes were consumed.
    ///
    /// A tokenizer stops right after `MessageComplete`; the remaining input
    /// belongs to the next message and is left unconsumed until [`reset`](Tokenizer::reset).
    fn execute(&mut self, input: &[u8], sink: &mut TokenSink<'_>) -> Result<usize, ParseError>;

    /// Prepares for the next message.
    fn reset(&mut self);
}

#[derive(Debug)]
enum Stage {
    Head,
    Body(PayloadDecoder),
    Complete,
}

#[derive(Debug)]
pub struct HttpTokenizer {
    header_decoder: HeaderDecoder,
    stage: Stage,
    /// bytes of the current head, kept until it is complete
    head: BytesMut,
}

impl HttpTokenizer {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_HEADERS, DEFAULT_MAX_HEADER_BYTES)
    }

    pub fn with_limits(max_headers: usize, max_header_bytes: usize) -> Self {
        Self {
            header_decoder: HeaderDecoder::new(max_headers, max_header_bytes),
            stage: Stage::Head,
            head: BytesMut::new(),
        }
    }

    /// Scans the accumulated head. Returns the body bytes that arrived with
    /// it, or `None` while the head is incomplete.
    fn scan_head(&mut self, input: &[u8], sink: &mut TokenSink<'_>) -> Result<Option<BytesMut>, ParseError> {
        if self.head.is_empty() && !input.is_empty() {
            sink(Token::MessageBegin)?;
        }
        self.head.extend_from_slice(input);

        let head = match self.header_decoder.decode(&self.head) {
            Ok(Some(head)) => head,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.abandon_head(sink)?;
                return Err(e);
            }
        };

        let bytes = &self.head[..];
        sink(Token::Url(&bytes[head.target.0..head.target.1]))?;
        for index in &head.headers {
            sink(Token::HeaderField(&bytes[index.name.0..index.name.1]))?;
            sink(Token::HeaderValue(&bytes[index.value.0..index.value.1]))?;
        }
        sink(Token::HeadersComplete { method: head.method, version: head.version })?;

        trace!(payload = ?head.payload, "request head complete");
        self.stage = Stage::Body(PayloadDecoder::from(head.payload));
        let rest = self.head.split_off(head.body_offset);
        self.head.clear();
        Ok(Some(rest))
    }

    /// Reports whatever survives of a head that failed to scan.
    fn abandon_head(&self, sink: &mut TokenSink<'_>) -> Result<(), ParseError> {
        let partial = salvage(&self.head);
        let bytes = &self.head[..];
        if let Some((start, end)) = partial.target {
            sink(Token::Url(&bytes[start..end]))?;
        }
        for index in &partial.headers {
            sink(Token::HeaderField(&bytes[index.name.0..index.name.1]))?;
            sink(Token::HeaderValue(&bytes[index.value.0..index.value.1]))?;
        }
        sink(Token::HeadAbandoned { method: partial.method, version: partial.version })
    }

    /// Feeds body bytes until they run out or the message completes.
    fn scan_body(&mut self, src: &mut BytesMut, sink: &mut TokenSink<'_>) -> Result<(), ParseError> {
        let Stage::Body(decoder) = &mut self.stage else {
            return Ok(());
        };
        while let Some(item) = decoder.decode(src)? {
            match item {
                PayloadItem::Chunk(bytes) => sink(Token::Body(bytes))?,
                PayloadItem::Eof => {
                    self.stage = Stage::Complete;
                    sink(Token::MessageComplete)?;
                    break;
                }
            }
        }
        Ok(())
    }
}

impl Default for HttpTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for HttpTokenizer {
    fn execute(&mut self, input: &[u8], sink: &mut TokenSink<'_>) -> Result<usize, ParseError> {
        let mut rest = match self.stage {
            Stage::Complete => return Ok(0),
            Stage::Head => match self.scan_head(input, sink)? {
                Some(rest) => rest,
                None => return Ok(input.len()),
            },
            Stage::Body(_) => BytesMut::from(input),
        };

        self.scan_body(&mut rest, sink)?;
        // a head is only complete once the bytes fed in this call were seen, so the
        // unconsumed tail is always part of `input`
        Ok(input.len() - rest.len())
    }

    fn reset(&mut self) {
        self.stage = Stage::Head;
        self.head.clear();
    }
}
