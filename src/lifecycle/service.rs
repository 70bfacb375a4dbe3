//! The service lifecycle manager.
//!
//! ```text
//! Constructed ──start──▶ Starting ──▶ Running ──signal──▶ Stopping ──▶ Stopped
//!      │                    │                               ▲
//!      └────────────────────┴───────────shutdown────────────┘
//! ```
//!
//! The RPC listener runs on its own task and its failures are only logged.
//! The HTTP listener runs on the caller's task and is the only start
//! failure that propagates.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::lifecycle::shutdown::{release_all, stop_transport, Resource};
use crate::lifecycle::signals::Signal;
use crate::lifecycle::LifecycleError;
use crate::net::Transport;
use crate::registry::ModuleSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Owns both listeners and drives startup and ordered shutdown.
pub struct Service<H: Transport, R: Transport> {
    http: Arc<H>,
    rpc: Arc<R>,
    summary: ModuleSummary,
    resources: Vec<Arc<dyn Resource>>,
    state: watch::Sender<LifecycleState>,
}

impl<H: Transport, R: Transport> Service<H, R> {
    pub fn new(http: Arc<H>, rpc: Arc<R>) -> Self {
        Self {
            http,
            rpc,
            summary: ModuleSummary::default(),
            resources: Vec::new(),
            state: watch::channel(LifecycleState::Constructed).0,
        }
    }

    /// Module names logged at start.
    pub fn with_summary(mut self, summary: ModuleSummary) -> Self {
        self.summary = summary;
        self
    }

    /// A resource released after both listeners have stopped.
    pub fn with_resource(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn http(&self) -> &Arc<H> {
        &self.http
    }

    pub fn rpc(&self) -> &Arc<R> {
        &self.rpc
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Move to `to` if the current state is one of `from`.
    fn transition(&self, from: &[LifecycleState], to: LifecycleState) -> bool {
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                tracing::debug!(from = %state, to = %to, "Lifecycle transition");
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Start both listeners. Blocks until the HTTP listener returns.
    ///
    /// The RPC listener is not awaited: HTTP may serve before RPC is bound.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        if !self.transition(&[LifecycleState::Constructed], LifecycleState::Starting) {
            tracing::warn!(state = %self.state(), "Service already started or stopping");
            return Ok(());
        }

        tracing::info!(modules = ?self.summary.rpc, "loaded grpc app");
        tracing::info!(modules = ?self.summary.http, "loaded http app");
        tracing::info!(modules = ?self.summary.internal, "loaded internal app");

        let rpc = self.rpc.clone();
        tokio::spawn(async move {
            match rpc.start().await {
                Ok(()) => tracing::info!("grpc service stopped"),
                Err(e) if e.is_closed() => tracing::info!("grpc service closed"),
                Err(e) => tracing::error!(error = %e, "start grpc service error"),
            }
        });

        self.transition(&[LifecycleState::Starting], LifecycleState::Running);

        match self.http.start().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_closed() => {
                tracing::info!("http service closed");
                Ok(())
            }
            Err(e) => Err(LifecycleError::Http(e)),
        }
    }

    /// Wait for one termination signal, then shut down.
    ///
    /// The receiver is dropped on return, so later signals go nowhere.
    pub async fn wait_signal(&self, mut rx: mpsc::Receiver<Signal>) {
        match rx.recv().await {
            Some(signal) => {
                tracing::info!(signal = %signal, "received signal, starting graceful shutdown");
                self.shutdown().await;
            }
            None => tracing::warn!("signal channel closed before any signal arrived"),
        }
    }

    /// Stop RPC, then HTTP, then release resources.
    ///
    /// Only the first call acts. A failed stop is logged and the sequence
    /// continues.
    pub async fn shutdown(&self) {
        let stoppable = [
            LifecycleState::Constructed,
            LifecycleState::Starting,
            LifecycleState::Running,
        ];
        if !self.transition(&stoppable, LifecycleState::Stopping) {
            tracing::debug!(state = %self.state(), "Shutdown already under way");
            return;
        }

        stop_transport(self.rpc.as_ref()).await;
        stop_transport(self.http.as_ref()).await;
        release_all(&self.resources).await;

        self.state.send_replace(LifecycleState::Stopped);
        tracing::info!("service stopped");
    }

    /// Resolves once the shutdown sequence has finished.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state == LifecycleState::Stopped).await;
    }

    /// Run until a signal arrives on `rx` and shutdown completes.
    ///
    /// A failing HTTP start still shuts the rest of the service down before
    /// the error is returned.
    pub async fn serve(self: &Arc<Self>, rx: mpsc::Receiver<Signal>) -> Result<(), LifecycleError> {
        let waiter = {
            let service = self.clone();
            tokio::spawn(async move { service.wait_signal(rx).await })
        };

        let result = self.start().await;
        if result.is_err() {
            self.shutdown().await;
        }

        self.stopped().await;
        waiter.abort();
        result
    }
}
