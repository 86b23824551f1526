//! Incremental request parser.
//!
//! [`IncrementalParser`] drives a [`Tokenizer`] over whatever bytes the
//! socket produced and assembles the tokens into [`ParsedItem`]s. Token bytes
//! are appended to a staging buffer and only flushed into the request field
//! they belong to when the parser moves to a different [`ParserState`], so a
//! URL or header value split across reads costs one copy per fragment and one
//! flush in total.

use std::collections::VecDeque;

use bytes::Bytes;
use http::Method;
use tracing::trace;

use crate::codec::tokenizer::{HttpTokenizer, Token, Tokenizer};
use crate::protocol::{Headers, HttpVersion, ParseError, RequestHead};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Idle,
    MessageBegan,
    UrlReceived,
    HeaderFieldReceived,
    HeaderValueReceived,
    HeadersCompleted,
    BodyReceived,
    MessageCompleted,
}

/// Output of the parser, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedItem {
    Request(RequestHead),
    Body(Bytes),
    End,
}

#[derive(Debug)]
pub struct IncrementalParser<T = HttpTokenizer> {
    tokenizer: T,
    assembler: Assembler,
    /// bytes of the current message were consumed
    started: bool,
}

impl IncrementalParser {
    pub fn new() -> Self {
        Self::with_tokenizer(HttpTokenizer::new())
    }
}

impl Default for IncrementalParser {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tokenizer> IncrementalParser<T> {
    pub fn with_tokenizer(tokenizer: T) -> Self {
        Self { tokenizer, assembler: Assembler::new(), started: false }
    }

    /// Feeds bytes read from the socket and returns how many were consumed.
    ///
    /// All of `input` is consumed unless the message completes inside it; the
    /// unconsumed tail then belongs to the next request. Consuming less
    /// without completing is reported as [`ParseError::ParsedLessThanRead`].
    pub fn feed(&mut self, input: &[u8]) -> Result<usize, ParseError> {
        if self.assembler.state == ParserState::MessageCompleted {
            return Ok(0);
        }

        let assembler = &mut self.assembler;
        let consumed = self.tokenizer.execute(input, &mut |token| assembler.on_token(token))?;
        trace!(consumed, read = input.len(), state = ?self.assembler.state, "fed request bytes");
        self.started |= consumed > 0;

        if consumed < input.len() && !self.is_message_complete() {
            return Err(ParseError::parsed_less_than_read(consumed, input.len()));
        }
        Ok(consumed)
    }

    /// Takes the next assembled item, if any.
    pub fn next_item(&mut self) -> Option<ParsedItem> {
        self.assembler.items.pop_front()
    }

    /// Whether any byte of the current message was consumed, even if the
    /// head is not complete yet.
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn state(&self) -> ParserState {
        self.assembler.state
    }

    #[inline]
    pub fn is_message_complete(&self) -> bool {
        self.assembler.state == ParserState::MessageCompleted
    }

    /// Whether the current request asked for keep-alive. Meaningful once headers completed.
    pub fn keep_alive(&self) -> bool {
        self.assembler.keep_alive
    }

    pub fn upgrade(&self) -> bool {
        self.assembler.upgrade
    }

    /// A well formed head built from whatever was parsed so far, used to
    /// answer a request that failed to parse.
    pub fn best_effort_head(&self) -> RequestHead {
        let assembler = &self.assembler;
        let defaults = RequestHead::default();
        RequestHead::new(
            assembler.method.clone().unwrap_or_else(|| defaults.method().clone()),
            assembler.target.as_deref().unwrap_or(defaults.target()),
            assembler.version.unwrap_or(defaults.version()),
            assembler.headers.clone(),
        )
    }

    /// Returns to [`ParserState::Idle`] for the next request on the connection.
    pub fn reset(&mut self) {
        self.tokenizer.reset();
        self.assembler = Assembler::new();
        self.started = false;
    }
}

#[derive(Debug)]
struct Assembler {
    state: ParserState,
    staging: Vec<u8>,
    target: Option<String>,
    field: Option<String>,
    headers: Headers,
    method: Option<Method>,
    version: Option<HttpVersion>,
    keep_alive: bool,
    upgrade: bool,
    items: VecDeque<ParsedItem>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            state: ParserState::Idle,
            staging: Vec::new(),
            target: None,
            field: None,
            headers: Headers::new(),
            method: None,
            version: None,
            keep_alive: false,
            upgrade: false,
            items: VecDeque::new(),
        }
    }

    fn on_token(&mut self, token: Token<'_>) -> Result<(), ParseError> {
        match token {
            Token::MessageBegin => self.transition(ParserState::MessageBegan)?,
            Token::Url(bytes) => {
                self.transition(ParserState::UrlReceived)?;
                self.staging.extend_from_slice(bytes);
            }
            Token::HeaderField(bytes) => {
                self.transition(ParserState::HeaderFieldReceived)?;
                self.staging.extend_from_slice(bytes);
            }
            Token::HeaderValue(bytes) => {
                self.transition(ParserState::HeaderValueReceived)?;
                self.staging.extend_from_slice(bytes);
            }
            Token::HeadersComplete { method, version } => {
                self.method = Some(method);
                self.version = Some(version);
                self.transition(ParserState::HeadersCompleted)?;
                self.dispatch()?;
            }
            Token::HeadAbandoned { method, version } => {
                self.flush_staged()?;
                self.method = method;
                self.version = version;
            }
            Token::Body(bytes) => {
                self.transition(ParserState::BodyReceived)?;
                self.items.push_back(ParsedItem::Body(bytes));
            }
            Token::MessageComplete => {
                self.transition(ParserState::MessageCompleted)?;
                self.items.push_back(ParsedItem::End);
            }
        }
        Ok(())
    }

    /// Moves to `next`, flushing the staging buffer into the field owned by
    /// the state being left. Staying in the same state flushes nothing.
    fn transition(&mut self, next: ParserState) -> Result<(), ParseError> {
        if self.state == next {
            return Ok(());
        }
        self.flush_staged()?;
        self.state = next;
        Ok(())
    }

    fn flush_staged(&mut self) -> Result<(), ParseError> {
        match self.state {
            ParserState::UrlReceived => self.target = Some(self.take_staged()),
            ParserState::HeaderFieldReceived => self.field = Some(self.take_staged()),
            ParserState::HeaderValueReceived => {
                let value = self.take_staged();
                let name = self.field.take().ok_or_else(|| ParseError::invalid_header("header value without a name"))?;
                self.headers.append(name, value);
            }
            _ => {}
        }
        Ok(())
    }

    fn take_staged(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.staging).into_owned();
        self.staging.clear();
        text
    }

    fn dispatch(&mut self) -> Result<(), ParseError> {
        let target = self.target.clone().ok_or(ParseError::InvalidUri)?;
        let method = self.method.clone().ok_or(ParseError::InvalidMethod)?;
        let version = self.version.ok_or(ParseError::InvalidVersion(None))?;

        let head = RequestHead::new(method, target, version, self.headers.clone());
        self.keep_alive = head.keep_alive();
        self.upgrade = head.is_upgrade();
        trace!(method = %head.method(), target = head.target(), keep_alive = self.keep_alive, "request head assembled");
        self.items.push_back(ParsedItem::Request(head));
        Ok(())
    }
}
