use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{HttpTokenizer, IncrementalParser, ParsedItem};
use crate::config::ServerConfig;
use crate::connection::body_channel::BodyChannel;
use crate::connection::feed::{ReadFeed, WriteFeed};
use crate::connection::lifecycle::ConnectionLifecycle;
use crate::connection::writer::{ResponseWriter, WriteCommand, WriterContext, write_loop};
use crate::handler::Handler;
use crate::protocol::{ConnectionError, ParseError, RequestHead, ResponseHead};
use crate::stats::ServerStats;

/// State one connection shares with the registry and the reaper.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub config: Arc<ServerConfig>,
    pub lifecycle: Arc<ConnectionLifecycle>,
    pub token: CancellationToken,
    pub stats: Arc<ServerStats>,
}

impl ConnectionContext {
    pub fn new(config: Arc<ServerConfig>, stats: Arc<ServerStats>) -> Self {
        let lifecycle =
            Arc::new(ConnectionLifecycle::new(config.get_max_requests(), config.get_keep_alive_timeout()));
        Self { config, lifecycle, token: CancellationToken::new(), stats }
    }
}

/// One HTTP/1.1 connection.
///
/// [`process`](HttpConnection::process) reads requests one at a time, hands
/// each head to the [`Handler`] and streams the body into the mode it picked.
/// Responses are written by a separate task fed through [`ResponseWriter`],
/// so a handler may answer before, during or after the body arrives. The next
/// request is only read once the previous response was completely flushed.
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    read_feed: ReadFeed<R>,
    writer: W,
    context: ConnectionContext,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W, context: ConnectionContext) -> Self {
        let capacity = context.config.get_read_buffer_size();
        Self { read_feed: ReadFeed::with_capacity(reader, capacity), writer, context }
    }

    /// Serves requests until the connection closes.
    ///
    /// Returns `Ok` when the connection ended normally: the client went away
    /// between requests, or keep-alive was not granted for the last exchange.
    pub async fn process<H: Handler + ?Sized>(self, handler: Arc<H>) -> Result<(), ConnectionError> {
        let Self { read_feed, writer, context } = self;
        let config = &context.config;

        let (commands, receiver) = mpsc::unbounded_channel();
        let response_done = Arc::new(Notify::new());
        let write_task = tokio::spawn(write_loop(
            WriteFeed::with_capacity(writer, config.get_read_buffer_size()),
            receiver,
            WriterContext {
                lifecycle: Arc::clone(&context.lifecycle),
                token: context.token.clone(),
                stats: Arc::clone(&context.stats),
                response_done: Arc::clone(&response_done),
            },
        ));

        let tokenizer = HttpTokenizer::with_limits(config.get_max_headers(), config.get_max_header_bytes());
        let mut reader = RequestReader {
            feed: read_feed,
            parser: IncrementalParser::with_tokenizer(tokenizer),
            handler,
            commands,
            response_done,
            context: &context,
            body: None,
        };
        let result = reader.run().await;
        drop(reader);

        context.lifecycle.close();
        context.token.cancel();
        if let Err(e) = write_task.await {
            error!(cause = %e, "response writer task failed");
        }
        result
    }
}

struct RequestReader<'c, R, H: ?Sized> {
    feed: ReadFeed<R>,
    parser: IncrementalParser,
    handler: Arc<H>,
    commands: mpsc::UnboundedSender<WriteCommand>,
    response_done: Arc<Notify>,
    context: &'c ConnectionContext,
    /// body delivery of the dispatched request, until its end was parsed
    body: Option<BodyChannel>,
}

impl<R, H> RequestReader<'_, R, H>
where
    R: AsyncRead + Unpin,
    H: Handler + ?Sized,
{
    async fn run(&mut self) -> Result<(), ConnectionError> {
        let mut need_input = self.feed.is_empty();

        loop {
            if need_input {
                let filled = tokio::select! {
                    biased;
                    () = self.context.token.cancelled() => return Err(ConnectionError::Aborted),
                    filled = self.feed.fill() => filled,
                };
                if let Err(e) = filled {
                    return self.on_read_error(e);
                }
            }

            let consumed = match self.parser.feed(self.feed.buffered()) {
                Ok(consumed) => consumed,
                Err(e) => return self.reject(e).await,
            };
            self.feed.consume(consumed);

            let mut produced = false;
            while let Some(item) = self.parser.next_item() {
                produced = true;
                match item {
                    ParsedItem::Request(head) => self.dispatch(head)?,
                    ParsedItem::Body(bytes) => self.deliver(bytes).await?,
                    ParsedItem::End => {
                        if !self.finish_exchange().await? {
                            return Ok(());
                        }
                    }
                }
            }

            need_input = self.feed.is_empty() || (consumed == 0 && !produced);
        }
    }

    fn dispatch(&mut self, head: RequestHead) -> Result<(), ConnectionError> {
        let lifecycle = &self.context.lifecycle;
        let Some(exchange) = lifecycle.begin_request(self.parser.keep_alive(), self.parser.upgrade()) else {
            return Err(ConnectionError::Aborted);
        };
        info!(method = %head.method(), target = head.target(), exchange, "received request");

        let writer = ResponseWriter::new(exchange, self.commands.clone());
        let mode = self.handler.serve(head, writer);
        self.body = Some(BodyChannel::new(mode));
        Ok(())
    }

    async fn deliver(&mut self, bytes: Bytes) -> Result<(), ConnectionError> {
        let Some(body) = self.body.as_mut() else {
            return Ok(());
        };
        tokio::select! {
            biased;
            () = self.context.token.cancelled() => Err(ConnectionError::Aborted),
            delivered = body.deliver(bytes) => delivered,
        }
    }

    /// Waits for the response of the current exchange, then decides whether
    /// another request may follow.
    async fn finish_exchange(&mut self) -> Result<bool, ConnectionError> {
        if let Some(mut body) = self.body.take() {
            body.finish();
        }

        tokio::select! {
            biased;
            () = self.context.token.cancelled() => return Err(ConnectionError::Aborted),
            () = self.response_done.notified() => {}
        }
        self.context.stats.request_served();

        let keep_alive = self.context.lifecycle.finish_request(Instant::now());
        if keep_alive {
            self.parser.reset();
        } else {
            debug!("keep-alive not granted, closing connection");
        }
        Ok(keep_alive)
    }

    fn on_read_error(&mut self, e: ConnectionError) -> Result<(), ConnectionError> {
        let between_requests = self.body.is_none() && !self.parser.has_started();
        if between_requests && matches!(e, ConnectionError::UnexpectedEof) {
            debug!("client closed the connection");
            return Ok(());
        }
        if let Some(body) = self.body.as_mut() {
            body.fail(e.to_body_error());
        }
        Err(e)
    }

    /// Answers `400 Bad Request` to a request that failed to parse, unless its
    /// head was already handed to the application.
    async fn reject(&mut self, e: ParseError) -> Result<(), ConnectionError> {
        let head = self.parser.best_effort_head();
        warn!(cause = %e, method = %head.method(), target = head.target(), "malformed request");

        let e = ConnectionError::from(e);
        if let Some(body) = self.body.as_mut() {
            body.fail(e.to_body_error());
            return Err(e);
        }

        let Some(exchange) = self.context.lifecycle.begin_rejection() else {
            return Err(e);
        };
        let writer = ResponseWriter::new(exchange, self.commands.clone());
        writer.write_response(ResponseHead::empty(StatusCode::BAD_REQUEST).with_version(head.version()));
        writer.done();

        tokio::select! {
            biased;
            () = self.context.token.cancelled() => {}
            () = self.response_done.notified() => {}
        }
        Err(e)
    }
}
