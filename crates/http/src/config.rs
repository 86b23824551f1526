use std::time::Duration;

use crate::codec::{DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_HEADERS};

/// Tunables shared by every connection of a server.
///
/// ```
/// use std::time::Duration;
/// use brook_http::ServerConfig;
///
/// let config = ServerConfig::default().keep_alive_timeout(Duration::from_secs(10)).max_requests(10);
/// assert_eq!(config.get_max_requests(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    keep_alive_timeout: Duration,
    max_requests: u32,
    read_buffer_size: usize,
    max_header_bytes: usize,
    max_headers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            keep_alive_timeout: Duration::from_secs(5),
            max_requests: 100,
            read_buffer_size: 8 * 1024,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_headers: DEFAULT_MAX_HEADERS,
        }
    }
}

impl ServerConfig {
    /// How long an idle keep-alive connection is kept, also the reaper period.
    ///
    /// `Keep-Alive: timeout` is advertised in whole seconds, so the value is
    /// rounded up to whole seconds and is at least one second.
    #[must_use]
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.keep_alive_timeout = Duration::from_secs(secs.max(1));
        self
    }

    /// Requests served on one connection before it is closed.
    #[must_use]
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    #[must_use]
    pub fn max_header_bytes(mut self, size: usize) -> Self {
        self.max_header_bytes = size;
        self
    }

    #[must_use]
    pub fn max_headers(mut self, count: usize) -> Self {
        self.max_headers = count;
        self
    }

    pub fn get_keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    pub fn get_max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn get_read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub fn get_max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn get_max_headers(&self) -> usize {
        self.max_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_timeout_is_whole_seconds() {
        let timeout = |duration| ServerConfig::default().keep_alive_timeout(duration).get_keep_alive_timeout();
        assert_eq!(timeout(Duration::ZERO), Duration::from_secs(1));
        assert_eq!(timeout(Duration::from_millis(300)), Duration::from_secs(1));
        assert_eq!(timeout(Duration::from_millis(1500)), Duration::from_secs(2));
        assert_eq!(timeout(Duration::from_secs(7)), Duration::from_secs(7));
    }
}
