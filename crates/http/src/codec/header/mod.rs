//! Request head scanning and response head serialization.
//!
//! - [`HeaderDecoder`] finds a complete request head with `httparse` and
//!   records the request line and fields as byte ranges
//! - [`HeaderEncoder`] writes a status line, framing header, application
//!   headers and the `Connection` directive

mod header_decoder;
mod header_encoder;

pub use header_decoder::{HeaderDecoder, PartialHead, salvage};
pub use header_encoder::{HeaderEncoder, Persistence};
