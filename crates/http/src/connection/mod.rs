//! HTTP connection handling.
//!
//! Each accepted socket is driven by an [`HttpConnection`], split in two
//! halves that run concurrently:
//!
//! - the reader feeds socket bytes to the incremental parser, hands request
//!   heads to the [`Handler`](crate::handler::Handler) and streams request
//!   bodies through a [`BodyChannel`], honoring the handler's acks
//! - the writer task drains the commands issued through [`ResponseWriter`],
//!   encodes them and flushes them to the socket in call order
//!
//! [`ConnectionLifecycle`] tracks keep-alive state for both halves and for
//! the idle reaper.

mod body_channel;
mod feed;
mod http_connection;
mod lifecycle;
mod writer;

pub use body_channel::BodyChannel;
pub use feed::{ReadFeed, WriteFeed};
pub use http_connection::{ConnectionContext, HttpConnection};
pub use lifecycle::{ConnectionLifecycle, Phase};
pub use writer::{Completion, ResponseWriter};
