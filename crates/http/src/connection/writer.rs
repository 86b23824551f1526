//! The response side of a connection.
//!
//! [`ResponseWriter`] is a cheap, cloneable handle that application code may
//! use from any thread. Every call becomes a [`WriteCommand`] on the
//! connection's queue; a single writer task drains the queue in order,
//! encodes the commands, flushes them to the socket and only then runs the
//! completions that were attached to them.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::codec::ResponseItem;
use crate::connection::feed::WriteFeed;
use crate::connection::lifecycle::ConnectionLifecycle;
use crate::protocol::{Headers, ResponseHead, SendError};
use crate::stats::ServerStats;

/// Callback run once the bytes of a write reached the socket, or with the
/// error that prevented it.
pub type Completion = Box<dyn FnOnce(Result<(), SendError>) + Send + 'static>;

/// Commands handled by one writer task iteration before it flushes.
const MAX_BATCH: usize = 32;

pub(crate) enum WriteOp {
    Continue(Headers),
    Response(ResponseHead),
    Body(Bytes),
    Trailer(String, String),
    Done,
}

pub(crate) enum WriteCommand {
    Write { exchange: u64, op: WriteOp, completion: Option<Completion> },
    Abort { exchange: u64 },
}

/// Handle used by the application to answer one request.
///
/// All methods take `&self` and never block; writes are queued and performed
/// in call order by the connection's writer task.
#[derive(Clone)]
pub struct ResponseWriter {
    exchange: u64,
    commands: mpsc::UnboundedSender<WriteCommand>,
}

impl ResponseWriter {
    pub(crate) fn new(exchange: u64, commands: mpsc::UnboundedSender<WriteCommand>) -> Self {
        Self { exchange, commands }
    }

    fn send(&self, op: WriteOp, completion: Option<Completion>) {
        let command = WriteCommand::Write { exchange: self.exchange, op, completion };
        if let Err(mpsc::error::SendError(WriteCommand::Write { completion: Some(completion), .. })) =
            self.commands.send(command)
        {
            completion(Err(SendError::ConnectionClosed));
        }
    }

    /// Writes an interim `100 Continue` response. Only valid before [`write_response`](Self::write_response).
    pub fn write_continue(&self, headers: Headers) {
        self.send(WriteOp::Continue(headers), None);
    }

    /// Writes the response head. Only the first call has an effect.
    pub fn write_response(&self, head: ResponseHead) {
        self.send(WriteOp::Response(head), None);
    }

    /// Writes body bytes, framed according to the response head.
    pub fn write_body(&self, bytes: impl Into<Bytes>) {
        self.send(WriteOp::Body(bytes.into()), None);
    }

    /// Like [`write_body`](Self::write_body), calling `completion` once the bytes were flushed.
    pub fn write_body_with<F>(&self, bytes: impl Into<Bytes>, completion: F)
    where
        F: FnOnce(Result<(), SendError>) + Send + 'static,
    {
        self.send(WriteOp::Body(bytes.into()), Some(Box::new(completion)));
    }

    /// Adds a trailer field to a chunked response, written by [`done`](Self::done).
    pub fn write_trailer(&self, name: impl Into<String>, value: impl Into<String>) {
        self.send(WriteOp::Trailer(name.into(), value.into()), None);
    }

    /// Finishes the response. The connection then waits for the next request
    /// or closes, depending on keep-alive.
    pub fn done(&self) {
        self.send(WriteOp::Done, None);
    }

    pub fn done_with<F>(&self, completion: F)
    where
        F: FnOnce(Result<(), SendError>) + Send + 'static,
    {
        self.send(WriteOp::Done, Some(Box::new(completion)));
    }

    /// Drops any unwritten response bytes and closes the connection.
    ///
    /// Has no effect once this writer's response was finished.
    pub fn abort(&self) {
        let _ = self.commands.send(WriteCommand::Abort { exchange: self.exchange });
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter").field("exchange", &self.exchange).finish_non_exhaustive()
    }
}

pub(crate) struct WriterContext {
    pub lifecycle: Arc<ConnectionLifecycle>,
    pub token: CancellationToken,
    pub stats: Arc<ServerStats>,
    /// signalled every time a response was completely flushed
    pub response_done: Arc<Notify>,
}

/// How a batch of commands left the connection.
enum BatchOutcome {
    Continue,
    ResponseDone,
    Close,
}

/// Drains the command queue onto the socket until the connection is cancelled.
pub(crate) async fn write_loop<W>(
    mut feed: WriteFeed<W>,
    mut commands: mpsc::UnboundedReceiver<WriteCommand>,
    context: WriterContext,
) where
    W: AsyncWrite + Unpin,
{
    let mut finished_exchange = 0;
    let is_stale = |exchange: u64, finished: u64| exchange != context.lifecycle.exchange() || exchange == finished;

    loop {
        let first = tokio::select! {
            biased;
            () = context.token.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match commands.try_recv() {
                Ok(command) => batch.push(command),
                Err(_) => break,
            }
        }

        let mut completions = Vec::new();
        let mut outcome = BatchOutcome::Continue;
        let mut aborted = false;
        for command in batch {
            let (exchange, op, completion) = match command {
                WriteCommand::Abort { exchange } if is_stale(exchange, finished_exchange) => {
                    debug!(exchange, "abort for a finished exchange, ignored");
                    continue;
                }
                WriteCommand::Abort { .. } => {
                    debug!(discarded = feed.pending(), "response aborted");
                    feed.discard();
                    aborted = true;
                    outcome = BatchOutcome::Close;
                    break;
                }
                WriteCommand::Write { exchange, op, completion } => (exchange, op, completion),
            };

            if is_stale(exchange, finished_exchange) {
                debug!(exchange, "write for a finished exchange, ignored");
                if let Some(completion) = completion {
                    completion(Err(SendError::ConnectionClosed));
                }
                continue;
            }

            let is_done = matches!(op, WriteOp::Done);
            let item = match op {
                WriteOp::Continue(headers) => ResponseItem::Continue(headers),
                WriteOp::Response(head) => ResponseItem::Head(head, context.lifecycle.persistence()),
                WriteOp::Body(bytes) => ResponseItem::Body(bytes),
                WriteOp::Trailer(name, value) => ResponseItem::Trailer(name, value),
                WriteOp::Done => ResponseItem::End,
            };

            let result = match feed.write(item) {
                Err(SendError::WriteBeforeHeaders { operation }) => {
                    context.stats.write_dropped();
                    warn!(operation, "write before the response head, dropped");
                    if is_done {
                        outcome = BatchOutcome::Close;
                    }
                    Err(SendError::WriteBeforeHeaders { operation })
                }
                Err(e) => {
                    if is_done {
                        // the response can't be framed, so the peer has to see the connection end
                        warn!(cause = %e, "response could not be finished, closing");
                        outcome = BatchOutcome::Close;
                    }
                    Err(e)
                }
                Ok(()) => {
                    if is_done {
                        finished_exchange = exchange;
                        outcome = BatchOutcome::ResponseDone;
                    }
                    Ok(())
                }
            };
            completions.push((completion, result));

            if matches!(outcome, BatchOutcome::Close) {
                break;
            }
        }

        let flushed = if context.lifecycle.is_open() && !aborted {
            tokio::select! {
                biased;
                () = context.token.cancelled() => Err(SendError::ConnectionClosed),
                result = feed.flush() => result,
            }
        } else {
            Err(SendError::ConnectionClosed)
        };

        let flush_failed = flushed.is_err();
        if let Err(e) = &flushed
            && !matches!(e, SendError::ConnectionClosed)
        {
            error!(cause = %e, "failed to write response");
        }

        for (completion, result) in completions {
            if let Some(completion) = completion {
                completion(if flush_failed { Err(SendError::ConnectionClosed) } else { result });
            }
        }

        match outcome {
            _ if flush_failed => {
                context.lifecycle.close();
                context.token.cancel();
                break;
            }
            BatchOutcome::Close => {
                context.lifecycle.close();
                context.token.cancel();
                break;
            }
            BatchOutcome::ResponseDone => {
                feed.next_response();
                context.response_done.notify_one();
            }
            BatchOutcome::Continue => {}
        }
    }

    commands.close();
    while let Ok(command) = commands.try_recv() {
        if let WriteCommand::Write { completion: Some(completion), .. } = command {
            completion(Err(SendError::ConnectionClosed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use http::StatusCode;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::task::JoinHandle;

    use crate::protocol::TransferEncoding;

    struct Harness {
        client: DuplexStream,
        commands: mpsc::UnboundedSender<WriteCommand>,
        lifecycle: Arc<ConnectionLifecycle>,
        token: CancellationToken,
        stats: Arc<ServerStats>,
        response_done: Arc<Notify>,
        task: JoinHandle<()>,
    }

    impl Harness {
        fn start(max_requests: u32) -> Self {
            let (client, server) = tokio::io::duplex(1024);
            let (commands, receiver) = mpsc::unbounded_channel();
            let lifecycle = Arc::new(ConnectionLifecycle::new(max_requests, Duration::from_secs(5)));
            let token = CancellationToken::new();
            let stats = Arc::new(ServerStats::default());
            let response_done = Arc::new(Notify::new());
            let context = WriterContext {
                lifecycle: Arc::clone(&lifecycle),
                token: token.clone(),
                stats: Arc::clone(&stats),
                response_done: Arc::clone(&response_done),
            };
            let task = tokio::spawn(write_loop(WriteFeed::with_capacity(server, 1024), receiver, context));
            Self { client, commands, lifecycle, token, stats, response_done, task }
        }

        fn writer(&self, keep_alive: bool) -> ResponseWriter {
            let exchange = self.lifecycle.begin_request(keep_alive, false).unwrap();
            ResponseWriter::new(exchange, self.commands.clone())
        }

        async fn read_exact(&mut self, len: usize) -> String {
            let mut buf = vec![0; len];
            self.client.read_exact(&mut buf).await.unwrap();
            String::from_utf8(buf).unwrap()
        }
    }

    const CHUNKED_HEAD: &str = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: Keep-Alive\r\nKeep-Alive: timeout=5, max=99\r\n\r\n";

    #[tokio::test]
    async fn writes_in_call_order_and_signals_done() {
        let mut harness = Harness::start(100);
        let writer = harness.writer(true);

        writer.write_response(ResponseHead::new(StatusCode::OK, TransferEncoding::Chunked));
        writer.write_response(ResponseHead::new(StatusCode::NOT_FOUND, TransferEncoding::Chunked));
        writer.write_body("abc");
        writer.write_body("");
        writer.done();

        harness.response_done.notified().await;
        let expected = format!("{CHUNKED_HEAD}3\r\nabc\r\n0\r\n\r\n");
        assert_eq!(harness.read_exact(expected.len()).await, expected);
    }

    #[tokio::test]
    async fn completion_runs_after_flush() {
        let mut harness = Harness::start(100);
        let writer = harness.writer(true);
        let (sender, receiver) = tokio::sync::oneshot::channel();

        writer.write_response(ResponseHead::new(StatusCode::OK, TransferEncoding::Chunked));
        writer.write_body_with("hi", move |result| {
            sender.send(result.is_ok()).unwrap();
        });

        assert!(receiver.await.unwrap());
        let expected = format!("{CHUNKED_HEAD}2\r\nhi\r\n");
        assert_eq!(harness.read_exact(expected.len()).await, expected);
    }

    #[tokio::test]
    async fn body_before_head_is_counted_and_dropped() {
        let harness = Harness::start(100);
        let writer = harness.writer(true);
        let (sender, receiver) = tokio::sync::oneshot::channel();

        writer.write_body_with("early", move |result| {
            sender.send(result).unwrap();
        });

        assert!(matches!(receiver.await.unwrap(), Err(SendError::WriteBeforeHeaders { .. })));
        assert_eq!(harness.stats.snapshot().dropped_writes, 1);
        assert!(!harness.token.is_cancelled());
    }

    #[tokio::test]
    async fn done_before_head_closes_connection() {
        let harness = Harness::start(100);
        let writer = harness.writer(true);
        writer.done();

        harness.task.await.unwrap();
        assert!(harness.token.is_cancelled());
        assert!(!harness.lifecycle.is_open());
        assert_eq!(harness.stats.snapshot().dropped_writes, 1);
    }

    #[tokio::test]
    async fn abort_cancels_connection() {
        let harness = Harness::start(100);
        let writer = harness.writer(true);
        writer.write_response(ResponseHead::new(StatusCode::OK, TransferEncoding::Chunked));
        writer.abort();

        harness.task.await.unwrap();
        assert!(harness.token.is_cancelled());
    }

    #[tokio::test]
    async fn abort_from_a_finished_exchange_is_ignored() {
        let mut harness = Harness::start(100);
        let first = harness.writer(true);
        first.write_response(ResponseHead::empty(StatusCode::NO_CONTENT));
        first.done();
        harness.response_done.notified().await;
        harness.lifecycle.finish_request(tokio::time::Instant::now());

        let second = harness.writer(true);
        first.abort();
        second.write_response(ResponseHead::new(StatusCode::OK, TransferEncoding::Identity(2)));
        second.write_body("ok");
        second.done();
        harness.response_done.notified().await;

        let first_head = "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: Keep-Alive\r\nKeep-Alive: timeout=5, max=99\r\n\r\n";
        let second_response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: Keep-Alive\r\nKeep-Alive: timeout=5, max=98\r\n\r\nok";
        assert_eq!(harness.read_exact(first_head.len()).await, first_head);
        assert_eq!(harness.read_exact(second_response.len()).await, second_response);
        assert!(!harness.token.is_cancelled());
        assert!(harness.lifecycle.is_open());
    }

    #[tokio::test]
    async fn short_identity_body_closes_connection() {
        let mut harness = Harness::start(100);
        let writer = harness.writer(true);
        let (sender, receiver) = tokio::sync::oneshot::channel();

        writer.write_response(ResponseHead::new(StatusCode::OK, TransferEncoding::Identity(10)));
        writer.write_body("hello");
        writer.done_with(move |result| {
            sender.send(result).unwrap();
        });

        assert!(matches!(receiver.await.unwrap(), Err(SendError::InvalidBody { .. })));
        harness.task.await.unwrap();
        assert!(harness.token.is_cancelled());
        assert!(!harness.lifecycle.is_open());

        // the bytes written so far still reach the peer, followed by the end of the stream
        let mut received = String::new();
        harness.client.read_to_string(&mut received).await.unwrap();
        assert!(received.starts_with("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n"));
        assert!(received.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn stale_writer_is_ignored() {
        let mut harness = Harness::start(100);
        let first = harness.writer(true);
        first.write_response(ResponseHead::empty(StatusCode::NO_CONTENT));
        first.done();
        harness.response_done.notified().await;
        harness.lifecycle.finish_request(tokio::time::Instant::now());

        let second = harness.writer(true);
        let (sender, receiver) = tokio::sync::oneshot::channel();
        first.write_body_with("late", move |result| {
            sender.send(result).unwrap();
        });
        assert!(matches!(receiver.await.unwrap(), Err(SendError::ConnectionClosed)));

        second.write_response(ResponseHead::empty(StatusCode::NO_CONTENT));
        second.done();
        harness.response_done.notified().await;

        let first_head = "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: Keep-Alive\r\nKeep-Alive: timeout=5, max=99\r\n\r\n";
        let second_head = "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: Keep-Alive\r\nKeep-Alive: timeout=5, max=98\r\n\r\n";
        assert_eq!(harness.read_exact(first_head.len()).await, first_head);
        assert_eq!(harness.read_exact(second_head.len()).await, second_head);
        assert_eq!(harness.stats.snapshot().dropped_writes, 0);
    }
}
