use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("parser consumed {parsed} of {read} bytes without completing the message")]
    ParsedLessThanRead { parsed: usize, read: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn parsed_less_than_read(parsed: usize, read: usize) -> Self {
        Self::ParsedLessThanRead { parsed, read }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("{operation} called before write_response")]
    WriteBeforeHeaders { operation: &'static str },

    #[error("connection already closed")]
    ConnectionClosed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Why a body stream ended early, delivered through `BodyChunk::Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    #[error("connection closed before the body was complete")]
    UnexpectedEof,

    #[error("connection reset by peer")]
    Reset,

    #[error("invalid body: {reason}")]
    Invalid { reason: String },

    #[error("io error: {reason}")]
    Io { reason: String },
}

/// Terminal outcome of a connection that did not close cleanly.
///
/// These never escape the connection task; they are logged and the
/// connection is torn down.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("peer closed the connection in the middle of a request")]
    UnexpectedEof,

    #[error("connection reset by peer")]
    SocketReset,

    #[error("socket error: {source}")]
    Socket {
        #[from]
        source: io::Error,
    },

    #[error("request rejected: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("response failed: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("body handler stopped before the body was drained")]
    BodyProcessingAborted,

    #[error("connection closed before the exchange finished")]
    Aborted,
}

impl ConnectionError {
    /// Maps a read-side io error, singling out resets which are routine.
    pub fn from_read(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => {
                Self::SocketReset
            }
            _ => Self::Socket { source: e },
        }
    }

    /// The error handed to a body handler when this failure cuts a body short.
    pub fn to_body_error(&self) -> BodyError {
        match self {
            ConnectionError::UnexpectedEof => BodyError::UnexpectedEof,
            ConnectionError::SocketReset => BodyError::Reset,
            ConnectionError::Parse { source } => BodyError::Invalid { reason: source.to_string() },
            e => BodyError::Io { reason: e.to_string() },
        }
    }
}
