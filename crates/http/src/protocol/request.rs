//! HTTP request head handling.
//!
//! A [`RequestHead`] is assembled incrementally by the parser and handed to
//! the application handler once the header section is complete. After that
//! it is never mutated by the engine.

use http::Method;

use crate::protocol::{Headers, HttpVersion};

/// The parsed head of an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    method: Method,
    target: String,
    version: HttpVersion,
    headers: Headers,
}

impl RequestHead {
    pub fn new(method: Method, target: impl Into<String>, version: HttpVersion, headers: Headers) -> Self {
        Self { method, target: target.into(), version, headers }
    }

    /// Returns the request method. Unrecognized tokens are kept as extension methods.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the raw request target, e.g. `/foo/bar?buz=qux`.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the path part of the request target.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// Returns the query part of the request target, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Whether the client asked to keep the connection open after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is sent;
    /// HTTP/1.0 defaults to close unless `Connection: keep-alive` is sent.
    pub fn keep_alive(&self) -> bool {
        if self.version.is_at_least_11() {
            !self.headers.contains_token("connection", "close")
        } else {
            self.headers.contains_token("connection", "keep-alive")
        }
    }

    /// Whether the request asks for a protocol upgrade (`Connection: upgrade`).
    pub fn is_upgrade(&self) -> bool {
        self.headers.contains_token("connection", "upgrade") && self.headers.contains("upgrade")
    }

    /// Whether the client sent `Expect: 100-continue`.
    pub fn expects_continue(&self) -> bool {
        self.headers.get("expect").is_some_and(|value| value.trim().eq_ignore_ascii_case("100-continue"))
    }
}

impl Default for RequestHead {
    /// An empty `GET / HTTP/1.1` head, used as the base of best effort heads.
    fn default() -> Self {
        Self { method: Method::GET, target: "/".to_string(), version: HttpVersion::HTTP_11, headers: Headers::new() }
    }
}
