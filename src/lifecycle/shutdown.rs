//! Shutdown sequencing.
//!
//! # Responsibilities
//! - Stop each listener in order, isolating failures
//! - Release process-wide resources once no listener can use them
//!
//! Nothing here retries. A step that fails is logged and the sequence
//! moves on.

use std::sync::Arc;

use async_trait::async_trait;

use crate::net::Transport;

/// Error returned by a resource that could not be released cleanly.
#[derive(Debug, thiserror::Error)]
#[error("release {resource}: {message}")]
pub struct ReleaseError {
    pub resource: &'static str,
    pub message: String,
}

/// A shared resource that must be released during shutdown.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn release(&self) -> Result<(), ReleaseError>;
}

/// Outcome of stopping one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Complete,
    Forced,
}

/// Stop `transport` and log the result. Never fails.
pub async fn stop_transport<T: Transport + ?Sized>(transport: &T) -> StopOutcome {
    let name = transport.name();
    tracing::info!(transport = name, "start graceful shutdown");

    match transport.stop().await {
        Ok(()) => {
            tracing::info!(transport = name, "stop complete");
            StopOutcome::Complete
        }
        Err(e) => {
            tracing::warn!(transport = name, "graceful shutdown err: {}, force exit", e);
            StopOutcome::Forced
        }
    }
}

/// Release every resource in order, logging failures.
pub async fn release_all(resources: &[Arc<dyn Resource>]) {
    for resource in resources {
        match resource.release().await {
            Ok(()) => tracing::debug!(resource = resource.name(), "Resource released"),
            Err(e) => tracing::error!(error = %e, "Failed to release resource"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Flaky {
        stops: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Transport for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn start(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn stop(&self) -> Result<(), TransportError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TransportError::DrainTimeout(Duration::from_secs(1)))
            } else {
                Ok(())
            }
        }
    }

    struct Sticky {
        releases: AtomicUsize,
    }

    #[async_trait]
    impl Resource for Sticky {
        fn name(&self) -> &'static str {
            "sticky"
        }

        async fn release(&self) -> Result<(), ReleaseError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Err(ReleaseError {
                resource: "sticky",
                message: "still in use".into(),
            })
        }
    }

    #[tokio::test]
    async fn failed_stop_reports_forced() {
        let flaky = Flaky {
            stops: AtomicUsize::new(0),
            fail: true,
        };
        assert_eq!(stop_transport(&flaky).await, StopOutcome::Forced);
        assert_eq!(flaky.stops.load(Ordering::SeqCst), 1);

        let clean = Flaky {
            stops: AtomicUsize::new(0),
            fail: false,
        };
        assert_eq!(stop_transport(&clean).await, StopOutcome::Complete);
    }

    #[tokio::test]
    async fn release_continues_past_failures() {
        let first = Arc::new(Sticky {
            releases: AtomicUsize::new(0),
        });
        let second = Arc::new(Sticky {
            releases: AtomicUsize::new(0),
        });
        let resources: Vec<Arc<dyn Resource>> = vec![first.clone(), second.clone()];

        release_all(&resources).await;
        assert_eq!(first.releases.load(Ordering::SeqCst), 1);
        assert_eq!(second.releases.load(Ordering::SeqCst), 1);
    }
}
