//! Incremental decoder for `Transfer-Encoding: chunked` request bodies
//! ([RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1)).
//!
//! Chunk extensions are ignored and trailer fields are skipped.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use super::PayloadItem;
use crate::protocol::ParseError;
use crate::utils::ensure;

use ChunkedState::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    /// size of the chunk being read, or left to read while in `Data`
    size: u64,
    size_digits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    Size,
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    TrailerStart,
    TrailerLine,
    TrailerLf,
    EndLf,
    Done,
}

/// 16 hex digits already cover `u64::MAX`
const MAX_SIZE_DIGITS: usize = 16;

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: Size, size: 0, size_digits: 0 }
    }

    fn push_size_digit(&mut self, byte: u8) -> Result<(), ParseError> {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => return Err(ParseError::invalid_body(format!("invalid chunk size byte: {byte:#04x}"))),
        };
        self.size_digits += 1;
        ensure!(self.size_digits <= MAX_SIZE_DIGITS, ParseError::invalid_body("chunk size overflow"));
        self.size = self.size * 16 + u64::from(digit);
        Ok(())
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn expect(byte: u8, wanted: u8) -> Result<(), ParseError> {
    ensure!(
        byte == wanted,
        ParseError::invalid_body(format!("expected {:?}, found {:?} in chunked body", wanted as char, byte as char))
    );
    Ok(())
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == Done {
                trace!("finished reading chunked body");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            if self.state == Data {
                let len = self.size.min(src.len() as u64) as usize;
                let bytes = src.split_to(len).freeze();
                self.size -= len as u64;
                if self.size == 0 {
                    self.state = DataCr;
                }
                trace!(len, "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }

            let byte = src.get_u8();
            self.state = match self.state {
                Size => match byte {
                    b'\r' => {
                        ensure!(self.size_digits > 0, ParseError::invalid_body("missing chunk size"));
                        SizeLf
                    }
                    b';' | b' ' | b'\t' => {
                        ensure!(self.size_digits > 0, ParseError::invalid_body("missing chunk size"));
                        Extension
                    }
                    _ => {
                        self.push_size_digit(byte)?;
                        Size
                    }
                },
                Extension => match byte {
                    b'\r' => SizeLf,
                    b'\n' => return Err(ParseError::invalid_body("bare LF in chunk extension")),
                    _ => Extension,
                },
                SizeLf => {
                    expect(byte, b'\n')?;
                    if self.size == 0 { TrailerStart } else { Data }
                }
                DataCr => {
                    expect(byte, b'\r')?;
                    DataLf
                }
                DataLf => {
                    expect(byte, b'\n')?;
                    self.size = 0;
                    self.size_digits = 0;
                    Size
                }
                TrailerStart => match byte {
                    b'\r' => EndLf,
                    _ => TrailerLine,
                },
                TrailerLine => match byte {
                    b'\r' => TrailerLf,
                    _ => TrailerLine,
                },
                TrailerLf => {
                    expect(byte, b'\n')?;
                    TrailerStart
                }
                EndLf => {
                    expect(byte, b'\n')?;
                    Done
                }
                Data | Done => unreachable!("handled before reading a byte"),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn decode_all(decoder: &mut ChunkedDecoder, buf: &mut BytesMut) -> Result<Vec<PayloadItem>, ParseError> {
        let mut items = vec![];
        while let Some(item) = decoder.decode(buf)? {
            let eof = item == PayloadItem::Eof;
            items.push(item);
            if eof {
                break;
            }
        }
        Ok(items)
    }

    #[test]
    fn decodes_chunks_and_terminator() {
        let mut buf = BytesMut::from(&b"5\r\nhello\r\n6;name=value\r\n world\r\n0\r\n\r\nGET"[..]);
        let mut decoder = ChunkedDecoder::new();

        let items = decode_all(&mut decoder, &mut buf).unwrap();
        assert_eq!(
            items,
            vec![
                PayloadItem::Chunk(Bytes::from_static(b"hello")),
                PayloadItem::Chunk(Bytes::from_static(b" world")),
                PayloadItem::Eof,
            ]
        );
        // bytes of the next message stay untouched
        assert_eq!(&buf[..], b"GET");
    }

    #[test]
    fn resumes_across_arbitrary_splits() {
        let input = b"A\r\n0123456789\r\n0\r\nx-trailer: 1\r\n\r\n";
        for split in 1..input.len() {
            let mut decoder = ChunkedDecoder::new();
            let mut body = Vec::new();
            let mut eof = false;
            for part in [&input[..split], &input[split..]] {
                let mut buf = BytesMut::from(part);
                for item in decode_all(&mut decoder, &mut buf).unwrap() {
                    match item {
                        PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
                        PayloadItem::Eof => eof = true,
                    }
                }
                assert!(buf.is_empty());
            }
            assert_eq!(body, b"0123456789", "split at {split}");
            assert!(eof, "split at {split}");
        }
    }

    #[test]
    fn rejects_bad_size() {
        let mut buf = BytesMut::from(&b"zz\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"11111111111111111\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_missing_crlf_after_data() {
        let mut buf = BytesMut::from(&b"2\r\nabXY"[..]);
        let mut decoder = ChunkedDecoder::new();
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(PayloadItem::Chunk(Bytes::from_static(b"ab"))));
        assert!(decoder.decode(&mut buf).is_err());
    }
}
