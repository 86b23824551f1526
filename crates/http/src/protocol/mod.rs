//! Core HTTP protocol types.
//!
//! This module holds the vocabulary shared by the parser, the connection
//! engine and application handlers:
//!
//! - **Heads**: [`RequestHead`] built by the
//!   parser, [`ResponseHead`] built by handlers, plus [`TransferEncoding`]
//! - **Headers**: [`Headers`], an ordered list that preserves
//!   original casing and offers case-insensitive lookups
//! - **Versions**: [`HttpVersion`]
//! - **Body streaming** ([`body`]): [`body::BodyChunk`], [`body::Ack`] and
//!   [`body::BodyProcessing`], the backpressure contract between parser and
//!   handler
//! - **Errors**: [`ParseError`], [`SendError`], [`BodyError`] and
//!   [`ConnectionError`]

mod header;
pub use header::Headers;

mod version;
pub use version::HttpVersion;

mod request;
pub use request::RequestHead;

mod response;
pub use response::ResponseHead;
pub use response::TransferEncoding;

mod error;
pub use error::BodyError;
pub use error::ConnectionError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
