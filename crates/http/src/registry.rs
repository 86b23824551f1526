use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection::ConnectionLifecycle;

/// Identifies a connection for as long as the server runs; ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the registry keeps of a live connection: enough to close it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub token: CancellationToken,
    pub lifecycle: Arc<ConnectionLifecycle>,
}

/// Live connections indexed by id.
///
/// A connection removes itself when its task ends; the reaper removes the
/// ones it closes. Removing twice is harmless.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionHandle>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert(&self, id: ConnectionId, handle: ConnectionHandle) {
        self.lock().insert(id, handle);
    }

    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Closes and forgets every connection idle past its deadline. Returns how
    /// many were closed.
    pub fn reap(&self, now: Instant) -> usize {
        self.sweep(now, false)
    }

    /// Closes and forgets every connection, whatever it is doing.
    pub fn close_all(&self) -> usize {
        self.sweep(Instant::now(), true)
    }

    fn sweep(&self, now: Instant, force: bool) -> usize {
        let mut connections = self.lock();
        let before = connections.len();
        connections.retain(|id, handle| {
            if handle.lifecycle.try_reap(now, force) {
                debug!(conn = %id, "closing connection");
                handle.token.cancel();
                false
            } else {
                true
            }
        });
        before - connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn register(registry: &ConnectionRegistry) -> (ConnectionId, ConnectionHandle) {
        let id = registry.next_id();
        let handle = ConnectionHandle {
            token: CancellationToken::new(),
            lifecycle: Arc::new(ConnectionLifecycle::new(100, TIMEOUT)),
        };
        registry.insert(id, handle.clone());
        (id, handle)
    }

    #[test]
    fn ids_are_unique() {
        let registry = ConnectionRegistry::new();
        assert_ne!(registry.next_id(), registry.next_id());
    }

    #[tokio::test]
    async fn remove_twice_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        let (id, _handle) = register(&registry);

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reap_closes_only_expired_idle_connections() {
        let registry = ConnectionRegistry::new();
        let (_idle, idle_handle) = register(&registry);
        let (_busy, busy_handle) = register(&registry);
        busy_handle.lifecycle.begin_request(true, false).unwrap();

        assert_eq!(registry.reap(Instant::now()), 0);

        tokio::time::advance(TIMEOUT).await;
        assert_eq!(registry.reap(Instant::now()), 1);
        assert!(idle_handle.token.is_cancelled());
        assert!(!busy_handle.token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn close_all_includes_active_connections() {
        let registry = ConnectionRegistry::new();
        let (_id, handle) = register(&registry);
        handle.lifecycle.begin_request(true, false).unwrap();
        register(&registry);

        assert_eq!(registry.close_all(), 2);
        assert!(handle.token.is_cancelled());
        assert!(!handle.lifecycle.is_open());
        assert!(registry.is_empty());
    }
}
