//! The contract shared by every transport listener.

use std::time::Duration;

use async_trait::async_trait;

/// Errors surfaced by a transport listener.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener was stopped. Returned by `start` after `stop`, this is
    /// the ordinary end of serving, not a failure.
    #[error("server closed")]
    Closed,

    #[error("listen {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("serve: {0}")]
    Serve(#[source] std::io::Error),

    #[error("in-flight work did not finish within {0:?}")]
    DrainTimeout(Duration),
}

impl TransportError {
    /// True for the sentinel produced by an intentional stop.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// A network listener owned by the lifecycle manager.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Short protocol name used in log lines ("http", "grpc").
    fn name(&self) -> &'static str;

    /// Bind and serve until stopped. Blocks the calling task.
    async fn start(&self) -> Result<(), TransportError>;

    /// Stop accepting work and wait, within a bound, for in-flight work.
    async fn stop(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_is_closed() {
        assert!(TransportError::Closed.is_closed());
        assert!(!TransportError::DrainTimeout(Duration::from_secs(1)).is_closed());
        let bind = TransportError::Bind {
            addr: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(!bind.is_closed());
        assert!(bind.to_string().contains("127.0.0.1:1"));
    }
}
