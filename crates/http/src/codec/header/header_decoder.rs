//! Request head scanning on top of [`httparse`].
//!
//! [`HeaderDecoder`] looks at the bytes accumulated since the start of a
//! request and either reports that the head is still incomplete, or returns a
//! [`ScannedHead`]: the request line and header fields as byte ranges into the
//! scanned buffer, plus the body framing derived from them. Recording ranges
//! instead of copying lets the tokenizer hand out slices of the original bytes.

use http::Method;
use httparse::Status;
use tracing::trace;

use crate::codec::body::PayloadSize;
use crate::protocol::{HttpVersion, ParseError};
use crate::utils::ensure;

/// Byte range of one header field inside the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderIndex {
    pub name: (usize, usize),
    pub value: (usize, usize),
}

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>]) -> Vec<HeaderIndex> {
        let base = bytes.as_ptr() as usize;
        headers
            .iter()
            .map(|header| {
                let name_start = header.name.as_ptr() as usize - base;
                let value_start = header.value.as_ptr() as usize - base;
                HeaderIndex {
                    name: (name_start, name_start + header.name.len()),
                    value: (value_start, value_start + header.value.len()),
                }
            })
            .collect()
    }
}

/// A complete request head, described by offsets into the scanned buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedHead {
    pub method: Method,
    pub version: HttpVersion,
    pub target: (usize, usize),
    pub headers: Vec<HeaderIndex>,
    /// length of the head including the blank line; body bytes start here
    pub body_offset: usize,
    pub payload: PayloadSize,
}

#[derive(Debug, Clone)]
pub struct HeaderDecoder {
    max_headers: usize,
    max_header_bytes: usize,
}

impl HeaderDecoder {
    pub fn new(max_headers: usize, max_header_bytes: usize) -> Self {
        Self { max_headers, max_header_bytes }
    }

    /// Scans `src` for a complete request head.
    ///
    /// Returns `Ok(None)` while the head is incomplete and still within the
    /// size limit.
    pub fn decode(&self, src: &[u8]) -> Result<Option<ScannedHead>, ParseError> {
        let mut headers = vec![httparse::EMPTY_HEADER; self.max_headers];
        let mut req = httparse::Request::new(&mut headers);

        let status = req.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(self.max_headers),
            httparse::Error::Version => ParseError::InvalidVersion(None),
            httparse::Error::Token => ParseError::InvalidMethod,
            e => ParseError::invalid_header(e),
        })?;

        let body_offset = match status {
            Status::Complete(offset) => offset,
            Status::Partial => {
                ensure!(
                    src.len() <= self.max_header_bytes,
                    ParseError::too_large_header(src.len(), self.max_header_bytes)
                );
                return Ok(None);
            }
        };

        trace!(head_size = body_offset, headers = req.headers.len(), "scanned request head");
        ensure!(body_offset <= self.max_header_bytes, ParseError::too_large_header(body_offset, self.max_header_bytes));

        let version = match req.version {
            Some(0) => HttpVersion::HTTP_10,
            Some(1) => HttpVersion::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };
        let method = req
            .method
            .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
            .ok_or(ParseError::InvalidMethod)?;
        let path = req.path.ok_or(ParseError::InvalidUri)?;
        let target_start = path.as_ptr() as usize - src.as_ptr() as usize;

        let payload = parse_payload(req.headers)?;
        let headers = HeaderIndex::record(src, req.headers);

        Ok(Some(ScannedHead {
            method,
            version,
            target: (target_start, target_start + path.len()),
            headers,
            body_offset,
            payload,
        }))
    }
}

/// The parts of a head that could be recovered after it failed to scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialHead {
    pub method: Option<Method>,
    pub version: Option<HttpVersion>,
    pub target: Option<(usize, usize)>,
    pub headers: Vec<HeaderIndex>,
}

/// Recovers the request line and every well formed header line from a head
/// that [`HeaderDecoder::decode`] rejected. Only complete lines are looked at.
pub fn salvage(src: &[u8]) -> PartialHead {
    let mut partial = PartialHead::default();
    let mut offset = 0;

    for (index, line) in src.split_inclusive(|b| *b == b'\n').enumerate() {
        let start = offset;
        offset += line.len();
        let Some(line) = line.strip_suffix(b"\n") else {
            break;
        };
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if index > 0 && line.is_empty() {
            break;
        }

        if index == 0 {
            salvage_request_line(line, start, &mut partial);
        } else if let Some(header) = salvage_header_line(line, start) {
            partial.headers.push(header);
        }
    }
    partial
}

fn salvage_request_line(line: &[u8], start: usize, partial: &mut PartialHead) {
    let mut parts = line.splitn(3, |b| *b == b' ');
    partial.method = parts.next().and_then(|m| Method::from_bytes(m).ok());
    if let Some(target) = parts.next().filter(|t| !t.is_empty()) {
        let target_start = start + target.as_ptr() as usize - line.as_ptr() as usize;
        partial.target = Some((target_start, target_start + target.len()));
    }
    partial.version = match parts.next() {
        Some(b"HTTP/1.0") => Some(HttpVersion::HTTP_10),
        Some(b"HTTP/1.1") => Some(HttpVersion::HTTP_11),
        _ => None,
    };
}

fn salvage_header_line(line: &[u8], start: usize) -> Option<HeaderIndex> {
    let colon = line.iter().position(|b| *b == b':')?;
    let name = &line[..colon];
    if name.is_empty() || !name.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    let value = line[colon + 1..].trim_ascii();
    let value_start = start + value.as_ptr() as usize - line.as_ptr() as usize;
    Some(HeaderIndex { name: (start, start + colon), value: (value_start, value_start + value.len()) })
}

/// Derives the body framing from `Transfer-Encoding` and `Content-Length`.
///
/// refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length
fn parse_payload(headers: &[httparse::Header<'_>]) -> Result<PayloadSize, ParseError> {
    let mut transfer_encoding = None;
    let mut content_length: Option<u64> = None;

    for header in headers {
        if header.name.eq_ignore_ascii_case("transfer-encoding") {
            transfer_encoding = Some(header.value);
        } else if header.name.eq_ignore_ascii_case("content-length") {
            let value = std::str::from_utf8(header.value)
                .map_err(|_| ParseError::invalid_content_length("value is not utf-8"))?
                .trim();
            let length = value
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {value} is not u64")))?;
            ensure!(
                content_length.is_none_or(|existing| existing == length),
                ParseError::invalid_content_length("conflicting content-length values")
            );
            content_length = Some(length);
        }
    }

    match (transfer_encoding, content_length) {
        (None, None) => Ok(PayloadSize::Empty),
        (None, Some(length)) => Ok(PayloadSize::Length(length)),
        (Some(value), None) => {
            ensure!(is_chunked(value), ParseError::invalid_body("transfer-encoding without final chunked coding"));
            Ok(PayloadSize::Chunked)
        }
        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer-encoding and content-length both present"))
        }
    }
}

/// `chunked` must be the last coding applied.
fn is_chunked(value: &[u8]) -> bool {
    value
        .rsplit(|b| *b == b',')
        .next()
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
