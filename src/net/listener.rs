//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to a configured `host:port`
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Publish the bound address, or the failure to bind, to waiters

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

use crate::net::TransportError;

/// Bind a plain TCP listener, reporting the address on failure.
pub async fn bind(addr: &str) -> Result<TcpListener, TransportError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Accept errors that concern only the connection being accepted. The
/// listener itself is still healthy after one of these.
pub fn is_connection_error(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
    )
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, accepting waits until a permit is released.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to `addr` with a connection limit.
    pub async fn bind(addr: &str, max_connections: usize) -> Result<Self, TransportError> {
        let inner = bind(addr).await?;

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// The returned permit must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), TransportError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| TransportError::Accept(std::io::Error::other(e)))?;

        let (stream, addr) = self.inner.accept().await.map_err(TransportError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindState {
    Pending,
    Bound(SocketAddr),
    Unbound,
}

/// Where a transport ended up listening, once it is known.
#[derive(Debug)]
pub struct BoundAddr(watch::Sender<BindState>);

impl Default for BoundAddr {
    fn default() -> Self {
        Self(watch::channel(BindState::Pending).0)
    }
}

impl BoundAddr {
    pub fn bound(&self, addr: SocketAddr) {
        self.0.send_replace(BindState::Bound(addr));
    }

    /// The listener will never bind: it failed to, or was stopped first.
    /// Has no effect once an address was published.
    pub fn unbound(&self) {
        self.0.send_if_modified(|state| {
            if *state == BindState::Pending {
                *state = BindState::Unbound;
                true
            } else {
                false
            }
        });
    }

    /// Wait for the outcome. `None` means the listener never bound.
    pub async fn wait(&self) -> Option<SocketAddr> {
        let mut rx = self.0.subscribe();
        let state = rx.wait_for(|state| *state != BindState::Pending).await.ok()?;
        let state = *state;
        match state {
            BindState::Bound(addr) => Some(addr),
            BindState::Pending | BindState::Unbound => None,
        }
    }
}

/// A connection slot, released back to the listener on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
