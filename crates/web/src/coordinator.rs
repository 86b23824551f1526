use brook_http::connection::ResponseWriter;
use brook_http::handler::Handler;
use brook_http::protocol::body::BodyProcessing;
use brook_http::protocol::{RequestHead, ResponseHead};
use http::StatusCode;
use tracing::info;

use crate::router::Router;

/// Connects the engine to a [`Router`], answering `404 Not Found` when no
/// route matches.
#[derive(Debug)]
pub struct Coordinator {
    router: Router,
}

impl Coordinator {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl Handler for Coordinator {
    fn serve(&self, req: RequestHead, res: ResponseWriter) -> BodyProcessing {
        let Some((path, handler)) = self.router.route(&req) else {
            info!(method = %req.method(), target = req.target(), "no route matched");
            res.write_response(ResponseHead::empty(StatusCode::NOT_FOUND).with_version(req.version()));
            res.done();
            return BodyProcessing::DiscardBody;
        };
        handler.serve(req, path, res)
    }
}
