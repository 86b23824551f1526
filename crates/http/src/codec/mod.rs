//! Wire codecs for HTTP/1.1 messages.
//!
//! # Requests
//!
//! - [`Tokenizer`] / [`HttpTokenizer`]: turns raw bytes into request tokens,
//!   using the head scanner in `header` and the body decoders in `body`
//! - [`IncrementalParser`]: assembles tokens into [`ParsedItem`]s
//!
//! # Responses
//!
//! - [`ResponseEncoder`]: serializes [`ResponseItem`]s, choosing the body
//!   framing from the response head
//!
//! ```
//! use brook_http::codec::{IncrementalParser, ParsedItem};
//!
//! let mut parser = IncrementalParser::new();
//! parser.feed(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
//!
//! let Some(ParsedItem::Request(head)) = parser.next_item() else { unreachable!() };
//! assert_eq!(head.path(), "/hello");
//! assert_eq!(parser.next_item(), Some(ParsedItem::End));
//! ```

mod body;
mod header;
mod parser;
mod response_encoder;
mod tokenizer;

pub use header::Persistence;
pub use parser::{IncrementalParser, ParsedItem, ParserState};
pub use response_encoder::{ResponseEncoder, ResponseItem};
pub use tokenizer::{DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_HEADERS, HttpTokenizer, Token, TokenSink, Tokenizer};
