use bytes::BytesMut;
use tokio_util::codec::Decoder;

use super::PayloadItem;
use crate::protocol::ParseError;

/// Decodes a body framed by `Content-Length`, never reading past the declared length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = self.remaining.min(src.len() as u64) as usize;
        let bytes = src.split_to(len).freeze();
        self.remaining -= len as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_declared_length() {
        let mut buffer = BytesMut::from(&b"1012345678GET / HTTP/1.1\r\n"[..]);
        let mut decoder = LengthDecoder::new(10);

        let item = decoder.decode(&mut buffer).unwrap();
        assert_eq!(item, Some(PayloadItem::Chunk(bytes::Bytes::from_static(b"1012345678"))));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
        assert_eq!(&buffer[..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn waits_for_more_bytes() {
        let mut decoder = LengthDecoder::new(4);
        let mut buffer = BytesMut::from(&b"ab"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().is_some());
        assert_eq!(decoder.decode(&mut buffer).unwrap(), None);

        let mut buffer = BytesMut::from(&b"cd"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().is_some());
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }
}
