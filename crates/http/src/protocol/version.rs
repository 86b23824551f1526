//! HTTP version handling.
//!
//! The engine only speaks HTTP/1.x, but requests carry whatever `major.minor`
//! pair the tokenizer saw so that keep-alive defaults can be derived from it.

use std::fmt;

/// An HTTP protocol version as a `(major, minor)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl HttpVersion {
    pub const HTTP_10: HttpVersion = HttpVersion { major: 1, minor: 0 };
    pub const HTTP_11: HttpVersion = HttpVersion { major: 1, minor: 1 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Returns true for HTTP/1.1 and any later 1.x minor version.
    #[inline]
    pub fn is_at_least_11(&self) -> bool {
        self.major > 1 || (self.major == 1 && self.minor >= 1)
    }
}

impl Default for HttpVersion {
    fn default() -> Self {
        Self::HTTP_11
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

impl From<(u8, u8)> for HttpVersion {
    fn from((major, minor): (u8, u8)) -> Self {
        Self { major, minor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(HttpVersion::HTTP_11.to_string(), "HTTP/1.1");
        assert_eq!(HttpVersion::HTTP_10.to_string(), "HTTP/1.0");
    }

    #[test]
    fn at_least_11() {
        assert!(HttpVersion::HTTP_11.is_at_least_11());
        assert!(!HttpVersion::HTTP_10.is_at_least_11());
        assert!(HttpVersion::new(2, 0).is_at_least_11());
    }
}
