//! Serialization of response heads.
//!
//! The encoder owns the framing and persistence headers: `Content-Length` or
//! `Transfer-Encoding` comes from the head's [`TransferEncoding`], and
//! `Connection`/`Keep-Alive` from the connection's [`Persistence`]. Headers
//! with those names set by the application are skipped, except that a
//! response to an upgrade request keeps its own `Connection` header.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::debug;

use crate::protocol::{ResponseHead, SendError, TransferEncoding};

/// Initial buffer size reserved for a response head
const INIT_HEADER_SIZE: usize = 512;

const FRAMING: [&str; 2] = ["content-length", "transfer-encoding"];
const CONNECTION_MANAGEMENT: [&str; 2] = ["connection", "keep-alive"];

/// Whether the connection stays open after the current response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    KeepAlive { timeout_secs: u64, max: u32 },
    Close,
    /// response to an upgrade request: no connection-management headers are written
    Upgrade,
}

#[derive(Debug)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, Persistence)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, Persistence), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (head, persistence) = item;

        dst.reserve(INIT_HEADER_SIZE);
        let reason = head.status.canonical_reason().unwrap_or("Unknown");
        put_line(dst, &format!("{} {} {}", head.version, head.status.as_str(), reason));

        match head.transfer_encoding {
            TransferEncoding::Identity(length) => put_line(dst, &format!("Content-Length: {length}")),
            TransferEncoding::Chunked => dst.put_slice(b"Transfer-Encoding: chunked\r\n"),
        }

        let upgrade = persistence == Persistence::Upgrade;
        for (name, value) in head.headers.iter() {
            let is = |names: &[&str]| names.iter().any(|owned| name.eq_ignore_ascii_case(owned));
            if is(&FRAMING) || (!upgrade && is(&CONNECTION_MANAGEMENT)) {
                debug!(header = name, "skipping engine-owned response header");
                continue;
            }
            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }

        match persistence {
            Persistence::KeepAlive { timeout_secs, max } => {
                dst.put_slice(b"Connection: Keep-Alive\r\n");
                put_line(dst, &format!("Keep-Alive: timeout={timeout_secs}, max={max}"));
            }
            Persistence::Close => dst.put_slice(b"Connection: Close\r\n"),
            Persistence::Upgrade => {}
        }

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn put_line(dst: &mut BytesMut, line: &str) {
    dst.put_slice(line.as_bytes());
    dst.put_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn encode(head: ResponseHead, persistence: Persistence) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, persistence), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn chunked_keep_alive_head() {
        let head = ResponseHead::new(StatusCode::OK, TransferEncoding::Chunked)
            .with_header("X-foo", "bar")
            .with_header("content-type", "text/plain");

        let expected = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Transfer-Encoding: chunked\r\n",
            "X-foo: bar\r\n",
            "content-type: text/plain\r\n",
            "Connection: Keep-Alive\r\n",
            "Keep-Alive: timeout=5, max=99\r\n",
            "\r\n",
        );
        assert_eq!(encode(head, Persistence::KeepAlive { timeout_secs: 5, max: 99 }), expected);
    }

    #[test]
    fn identity_close_head_drops_conflicting_headers() {
        let head = ResponseHead::new(StatusCode::BAD_REQUEST, TransferEncoding::Identity(0))
            .with_header("Content-Length", "12")
            .with_header("Connection", "keep-alive");

        assert_eq!(
            encode(head, Persistence::Close),
            "HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: Close\r\n\r\n"
        );
    }

    #[test]
    fn upgrade_keeps_application_connection_header() {
        let head = ResponseHead::new(StatusCode::SWITCHING_PROTOCOLS, TransferEncoding::Identity(0))
            .with_header("Connection", "Upgrade")
            .with_header("Upgrade", "websocket");

        assert_eq!(
            encode(head, Persistence::Upgrade),
            "HTTP/1.1 101 Switching Protocols\r\nContent-Length: 0\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n"
        );
    }
}
