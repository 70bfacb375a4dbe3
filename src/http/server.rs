//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router from the module registry
//! - Wire up middleware (tracing, request ID, timeout, panic recovery)
//! - Bind and serve until stopped
//! - Bound the graceful drain on stop

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::http::apidocs::{ApiDocs, APIDOCS_PATH};
use crate::net::listener::{self, BoundAddr};
use crate::net::{Transport, TransportError};
use crate::registry::Registry;

/// HTTP transport listener.
pub struct HttpServer {
    addr: String,
    router: Router,
    drain_timeout: Duration,
    /// Requests graceful shutdown.
    shutdown: CancellationToken,
    /// Cancelled once the serve loop has returned.
    stopped: CancellationToken,
    /// Abandons a drain that overran its bound.
    force: CancellationToken,
    serving: AtomicBool,
    bound: BoundAddr,
}

impl HttpServer {
    /// Create a server serving `routes` with the standard middleware stack.
    pub fn new(config: &Config, routes: Router) -> Self {
        Self {
            addr: config.app.http.addr(),
            router: Self::build_router(config, routes),
            drain_timeout: Duration::from_secs(config.app.drain_timeout_secs),
            shutdown: CancellationToken::new(),
            stopped: CancellationToken::new(),
            force: CancellationToken::new(),
            serving: AtomicBool::new(false),
            bound: BoundAddr::default(),
        }
    }

    /// Create a server exposing every HTTP module of `registry`.
    pub fn from_registry(config: &Config, registry: &Registry) -> Self {
        let app_name = &config.app.name;
        let docs = ApiDocs::new(app_name, registry.summary().http);

        let routes = Router::new()
            .route(
                APIDOCS_PATH,
                get(move || {
                    let docs = docs.clone();
                    async move { Json(docs) }
                }),
            )
            .merge(registry.http_router(app_name));

        Self::new(config, routes)
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &Config, routes: Router) -> Router {
        routes
            .layer(CatchPanicLayer::new())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.app.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Wait until the listener is bound and return its address.
    ///
    /// Resolves to `None` if binding failed or the server was stopped
    /// before it bound.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.wait().await
    }
}

#[async_trait]
impl Transport for HttpServer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            self.bound.unbound();
            return Err(TransportError::Closed);
        }

        self.serving.store(true, Ordering::SeqCst);
        let _stopped = self.stopped.clone().drop_guard();

        let listener = listener::bind(&self.addr)
            .await
            .inspect_err(|_| self.bound.unbound())?;
        let local_addr = listener
            .local_addr()
            .map_err(TransportError::Accept)
            .inspect_err(|_| self.bound.unbound())?;
        self.bound.bound(local_addr);
        tracing::info!(address = %local_addr, "HTTP service listening");

        let app = self
            .router
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = self.shutdown.clone();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .into_future();

        let result = tokio::select! {
            result = serve => result,
            _ = self.force.cancelled() => {
                tracing::warn!("HTTP drain abandoned, dropping open connections");
                Ok(())
            }
        };

        match result {
            Ok(()) if self.shutdown.is_cancelled() => Err(TransportError::Closed),
            Ok(()) => Ok(()),
            Err(e) => Err(TransportError::Serve(e)),
        }
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.shutdown.cancel();
        self.bound.unbound();
        if !self.serving.load(Ordering::SeqCst) {
            return Ok(());
        }

        match tokio::time::timeout(self.drain_timeout, self.stopped.cancelled()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                self.force.cancel();
                Err(TransportError::DrainTimeout(self.drain_timeout))
            }
        }
    }
}
