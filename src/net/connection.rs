//! Connection identity and open-connection accounting.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::observability::metrics;

/// Relaxed ordering is enough: ids only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection, used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Keeps the active-connection gauge in step with a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn open() -> Self {
        let id = ConnectionId::new();
        metrics::rpc_connection_opened();
        tracing::trace!(connection_id = %id, "Connection opened");
        Self { id }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::rpc_connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
