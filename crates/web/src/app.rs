//! Ready-made applications, mostly useful for demos and tests.

use brook_http::connection::ResponseWriter;
use brook_http::protocol::body::{BodyChunk, BodyProcessing};
use brook_http::protocol::{Headers, RequestHead, ResponseHead, TransferEncoding};
use bytes::{Bytes, BytesMut};
use http::StatusCode;
use tracing::debug;

use crate::router::{PathComponents, RouteHandler};

/// Streams the request body back as a chunked response.
///
/// Each chunk is acknowledged only once its echo was flushed, so a slow
/// client throttles the upload. A client waiting on `Expect: 100-continue`
/// is told to go ahead first.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoApp;

impl RouteHandler for EchoApp {
    fn serve(&self, req: RequestHead, _path: PathComponents, res: ResponseWriter) -> BodyProcessing {
        if req.expects_continue() {
            res.write_continue(Headers::new());
        }
        res.write_response(
            ResponseHead::new(StatusCode::OK, TransferEncoding::Chunked)
                .with_version(req.version())
                .with_header("X-foo", "bar"),
        );
        BodyProcessing::process(move |chunk, stop| match chunk {
            BodyChunk::Chunk(bytes, ack) => res.write_body_with(bytes, move |_| ack.ack()),
            BodyChunk::Trailer(..) => {}
            BodyChunk::End => res.done(),
            BodyChunk::Failed(e) => {
                debug!(cause = %e, "echo body failed");
                *stop = true;
                res.abort();
            }
        })
    }
}

/// Answers `Hello, World!` once the request body was drained.
#[derive(Debug, Default, Clone, Copy)]
pub struct HelloWorldApp;

impl RouteHandler for HelloWorldApp {
    fn serve(&self, req: RequestHead, _path: PathComponents, res: ResponseWriter) -> BodyProcessing {
        res.write_response(
            ResponseHead::new(StatusCode::OK, TransferEncoding::Chunked)
                .with_version(req.version())
                .with_header("X-foo", "bar"),
        );
        BodyProcessing::process(move |chunk, stop| match chunk {
            BodyChunk::Chunk(_, ack) => ack.ack(),
            BodyChunk::Trailer(..) => {}
            BodyChunk::End => {
                res.write_body(Bytes::from_static(b"Hello, World!"));
                res.done();
            }
            BodyChunk::Failed(_) => {
                *stop = true;
                res.abort();
            }
        })
    }
}

/// Buffers the whole request body and hands it to a plain function that
/// returns the complete response.
///
/// ```
/// use brook_http::protocol::{ResponseHead, TransferEncoding};
/// use brook_web::app::SimpleResponder;
/// use http::StatusCode;
///
/// let greet = SimpleResponder::new(|_req, path, _body| {
///     let name = path.parameter("name").unwrap_or("stranger");
///     (ResponseHead::new(StatusCode::OK, TransferEncoding::Chunked), format!("hello {name}").into())
/// });
/// # let _ = greet;
/// ```
#[derive(Debug)]
pub struct SimpleResponder<F> {
    f: F,
}

impl<F> SimpleResponder<F>
where
    F: Fn(&RequestHead, &PathComponents, Bytes) -> (ResponseHead, Bytes) + Send + Sync + Clone + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> RouteHandler for SimpleResponder<F>
where
    F: Fn(&RequestHead, &PathComponents, Bytes) -> (ResponseHead, Bytes) + Send + Sync + Clone + 'static,
{
    fn serve(&self, req: RequestHead, path: PathComponents, res: ResponseWriter) -> BodyProcessing {
        let f = self.f.clone();
        let mut buffer = BytesMut::new();
        BodyProcessing::process(move |chunk, stop| match chunk {
            BodyChunk::Chunk(bytes, ack) => {
                buffer.extend_from_slice(&bytes);
                ack.ack();
            }
            BodyChunk::Trailer(..) => {}
            BodyChunk::End => {
                let (head, body) = f(&req, &path, buffer.split().freeze());
                res.write_response(head.with_version(req.version()));
                let done = res.clone();
                res.write_body_with(body, move |_| done.done());
            }
            BodyChunk::Failed(_) => {
                *stop = true;
                res.abort();
            }
        })
    }
}
