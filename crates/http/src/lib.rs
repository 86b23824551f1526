//! A streaming HTTP/1.1 connection engine.
//!
//! `brook-http` accepts TCP connections, parses requests incrementally and
//! hands them to an application [`Handler`](handler::Handler) as soon as the
//! head is complete. Request bodies are pushed to the handler chunk by chunk
//! under explicit backpressure, and responses are written through a
//! [`ResponseWriter`](connection::ResponseWriter) that may be used from any
//! thread. Persistent connections follow the `Keep-Alive` contract: a
//! per-connection request allowance and an idle timeout enforced by a
//! periodic reaper.
//!
//! # Example
//!
//! ```no_run
//! use brook_http::Server;
//! use brook_http::handler::make_handler;
//! use brook_http::protocol::body::{BodyChunk, BodyProcessing};
//! use brook_http::protocol::{ResponseHead, TransferEncoding};
//! use http::StatusCode;
//! use tracing::Level;
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     // echoes every request body back as a chunked response
//!     let echo = make_handler(|_req, res| {
//!         res.write_response(ResponseHead::new(StatusCode::OK, TransferEncoding::Chunked));
//!         BodyProcessing::process(move |chunk, stop| match chunk {
//!             BodyChunk::Chunk(bytes, ack) => res.write_body_with(bytes, move |_| ack.ack()),
//!             BodyChunk::Trailer(..) => {}
//!             BodyChunk::End => res.done(),
//!             BodyChunk::Failed(_) => {
//!                 *stop = true;
//!                 res.abort();
//!             }
//!         })
//!     });
//!
//!     let server = Server::builder().address("127.0.0.1:8080").handler(echo).build().expect("valid server");
//!     if let Err(e) = server.run().await {
//!         tracing::error!(cause = %e, "server failed");
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: heads, headers, body chunks and error types
//! - [`codec`]: the tokenizer, the incremental parser and the response encoder
//! - [`connection`]: per-connection reader and writer, keep-alive lifecycle
//! - [`handler`]: the application entry point
//! - [`Server`]: accept loop, connection registry and idle reaper
//!
//! # Limitations
//!
//! - HTTP/1.1 and HTTP/1.0 only
//! - No TLS, no request pipelining beyond answering queued requests in order
//! - No per-read or per-write timeouts; only idle connections time out

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod config;
mod reaper;
mod registry;
mod server;
mod stats;
mod utils;

pub use config::ServerConfig;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use server::{RunningServer, Server, ServerBuildError, ServerBuilder, ServerError};
pub use stats::{ServerStats, StatsSnapshot};
