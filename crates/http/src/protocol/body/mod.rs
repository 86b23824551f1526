//! HTTP request body streaming types.
//!
//! The engine never buffers a whole request body. Instead the application
//! handler chooses a [`BodyProcessing`] mode when it receives the request
//! head, and body bytes are pushed to it one [`BodyChunk`] at a time.
//!
//! # Backpressure
//!
//! Every [`BodyChunk::Chunk`] carries an [`Ack`]. The engine does not deliver
//! the next chunk, and does not read more bytes from the socket, until that
//! ack has been released, either by calling [`Ack::ack`] or by dropping it.
//! This lets a handler tie the release to something slow, such as the
//! completion of a response write:
//!
//! ```no_run
//! use brook_http::protocol::body::{BodyChunk, BodyProcessing};
//! # fn example(res: brook_http::connection::ResponseWriter) -> BodyProcessing {
//! BodyProcessing::process(move |chunk, stop| match chunk {
//!     BodyChunk::Chunk(bytes, ack) => res.write_body_with(bytes, move |_| ack.ack()),
//!     BodyChunk::End => res.done(),
//!     _ => {
//!         *stop = true;
//!         res.abort();
//!     }
//! })
//! # }
//! ```

mod chunk;

pub use chunk::Ack;
pub use chunk::BodyChunk;
pub use chunk::BodyHandler;
pub use chunk::BodyProcessing;
