//! RPC server: accept loop, per-connection framing and graceful drain.

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};

use crate::config::Config;
use crate::net::connection::ConnectionGuard;
use crate::net::listener::{is_connection_error, BoundAddr, ConnectionPermit, Listener};
use crate::net::{Transport, TransportError};
use crate::rpc::interceptor::{RecoveryLayer, TraceCallLayer};
use crate::rpc::protocol::{RpcRequest, RpcResponse, RpcStatus, MAX_FRAME_LENGTH};
use crate::rpc::router::RpcRouter;

/// The type-erased dispatch chain shared by all connections.
pub type RpcService = BoxCloneService<RpcRequest, Value, RpcStatus>;

type Interceptor = Box<dyn FnOnce(RpcService) -> RpcService + Send>;

/// Assembles an [`RpcServer`] from a router and optional interceptors.
pub struct RpcServerBuilder {
    addr: String,
    max_connections: usize,
    drain_timeout: Duration,
    router: RpcRouter,
    interceptors: Vec<Interceptor>,
}

impl RpcServerBuilder {
    pub fn new(addr: impl Into<String>, router: RpcRouter) -> Self {
        Self {
            addr: addr.into(),
            max_connections: 10_000,
            drain_timeout: Duration::from_secs(30),
            router,
            interceptors: Vec::new(),
        }
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Add an interceptor below the recovery boundary.
    ///
    /// Interceptors run in the order they are added, before the handler.
    pub fn interceptor<L>(mut self, layer: L) -> Self
    where
        L: Layer<RpcService> + Send + 'static,
        L::Service: Service<RpcRequest, Response = Value, Error = RpcStatus> + Clone + Send + 'static,
        <L::Service as Service<RpcRequest>>::Future: Send + 'static,
    {
        self.interceptors
            .push(Box::new(move |inner| BoxCloneService::new(layer.layer(inner))));
        self
    }

    pub fn build(self) -> RpcServer {
        let mut service: RpcService = BoxCloneService::new(self.router.into_service());
        for interceptor in self.interceptors.into_iter().rev() {
            service = interceptor(service);
        }
        let service = BoxCloneService::new(TraceCallLayer.layer(service));
        let service = BoxCloneService::new(RecoveryLayer.layer(service));

        RpcServer {
            addr: self.addr,
            max_connections: self.max_connections,
            drain_timeout: self.drain_timeout,
            service: Mutex::new(service),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            bound: BoundAddr::default(),
        }
    }
}

/// The RPC transport listener.
pub struct RpcServer {
    addr: String,
    max_connections: usize,
    drain_timeout: Duration,
    service: Mutex<RpcService>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    bound: BoundAddr,
}

impl RpcServer {
    /// Build the server for `config`, dispatching to `router`.
    pub fn new(config: &Config, router: RpcRouter) -> Self {
        Self::builder(config, router).build()
    }

    /// Like [`RpcServer::new`] but leaves room for interceptors.
    pub fn builder(config: &Config, router: RpcRouter) -> RpcServerBuilder {
        RpcServerBuilder::new(config.app.grpc.addr(), router)
            .max_connections(config.app.grpc.max_connections)
            .drain_timeout(Duration::from_secs(config.app.drain_timeout_secs))
    }

    /// Wait until the listener is bound and return its address.
    ///
    /// Resolves to `None` if binding failed or the server was stopped
    /// before it bound.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.wait().await
    }

    /// Accept until stopped. A failed accept that concerns only the
    /// incoming connection is skipped; any other ends serving.
    async fn serve(&self, listener: Listener) -> Result<(), TransportError> {
        let service = self
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        self.tracker.spawn(serve_connection(
                            stream,
                            peer,
                            permit,
                            service.clone(),
                            self.shutdown.clone(),
                            self.tracker.clone(),
                        ));
                    }
                    Err(TransportError::Accept(e)) if is_connection_error(&e) => {
                        tracing::debug!(error = %e, "RPC connection dropped during accept");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "RPC accept failed, no longer serving");
                        return Err(e);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Transport for RpcServer {
    fn name(&self) -> &'static str {
        "grpc"
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            self.bound.unbound();
            return Err(TransportError::Closed);
        }

        // Held until the accept loop and listener are gone, so `stop` also
        // waits for the socket to close.
        let _serving = self.tracker.token();
        let listener = Listener::bind(&self.addr, self.max_connections)
            .await
            .inspect_err(|_| self.bound.unbound())?;
        let local_addr = listener
            .local_addr()
            .map_err(TransportError::Accept)
            .inspect_err(|_| self.bound.unbound())?;
        self.bound.bound(local_addr);
        tracing::info!(address = %local_addr, "RPC service listening");

        self.serve(listener).await
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.shutdown.cancel();
        self.bound.unbound();
        self.tracker.close();

        match tokio::time::timeout(self.drain_timeout, self.tracker.wait()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(TransportError::DrainTimeout(self.drain_timeout)),
        }
    }
}

/// Read frames until the peer hangs up or shutdown begins, then let every
/// in-flight call finish and flush its response.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    service: RpcService,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    let guard = ConnectionGuard::open();
    let connection_id = guard.id();
    tracing::debug!(connection_id = %connection_id, peer_addr = %peer, "RPC connection opened");

    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    let (mut sink, mut frames) = Framed::new(stream, codec).split();
    let (tx, mut rx) = mpsc::channel::<RpcResponse>(64);

    let writer = tracker.spawn(async move {
        while let Some(response) = rx.recv().await {
            let encoded = match serde_json::to_vec(&response) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode RPC response");
                    continue;
                }
            };
            if let Err(e) = sink.send(Bytes::from(encoded)).await {
                tracing::debug!(error = %e, "RPC peer went away before response was written");
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            frame = frames.next() => frame,
        };

        let bytes = match frame {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "RPC frame error");
                break;
            }
            None => break,
        };

        let request: RpcRequest = match serde_json::from_slice(&bytes) {
            Ok(request) => request,
            Err(e) => {
                let status = RpcStatus::invalid_argument(format!("malformed request: {}", e));
                let _ = tx.send(RpcResponse::from_result(0, Err(status))).await;
                continue;
            }
        };

        let service = service.clone();
        let tx = tx.clone();
        tracker.spawn(async move {
            let id = request.id;
            let result = service.oneshot(request).await;
            let _ = tx.send(RpcResponse::from_result(id, result)).await;
        });
    }

    // The writer ends once every in-flight call has dropped its sender.
    drop(tx);
    let _ = writer.await;
    tracing::debug!(connection_id = %connection_id, "RPC connection closed");
}
