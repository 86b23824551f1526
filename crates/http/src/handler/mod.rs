use std::sync::Arc;

use crate::connection::ResponseWriter;
use crate::protocol::RequestHead;
use crate::protocol::body::BodyProcessing;

/// Application entry point, called once per request as soon as its head is parsed.
///
/// The handler answers through `res`, now or later and from any thread, and
/// returns how the engine should treat the request body.
pub trait Handler: Send + Sync + 'static {
    fn serve(&self, req: RequestHead, res: ResponseWriter) -> BodyProcessing;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve(&self, req: RequestHead, res: ResponseWriter) -> BodyProcessing {
        (**self).serve(req, res)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve(&self, req: RequestHead, res: ResponseWriter) -> BodyProcessing {
        (**self).serve(req, res)
    }
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(RequestHead, ResponseWriter) -> BodyProcessing + Send + Sync + 'static,
{
    fn serve(&self, req: RequestHead, res: ResponseWriter) -> BodyProcessing {
        (self.f)(req, res)
    }
}

/// Turns a closure into a [`Handler`].
///
/// ```
/// use brook_http::handler::make_handler;
/// use brook_http::protocol::ResponseHead;
/// use brook_http::protocol::body::BodyProcessing;
/// use http::StatusCode;
///
/// let handler = make_handler(|_req, res| {
///     res.write_response(ResponseHead::empty(StatusCode::NO_CONTENT));
///     res.done();
///     BodyProcessing::DiscardBody
/// });
/// # let _ = handler;
/// ```
pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: Fn(RequestHead, ResponseWriter) -> BodyProcessing + Send + Sync + 'static,
{
    HandlerFn { f }
}
