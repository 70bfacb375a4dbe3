//! Startup orchestration.
//!
//! # Responsibilities
//! - Create the store handle (unconnected)
//! - Register and initialise modules
//! - Build both listeners from the registry
//!
//! # Design Decisions
//! - Fail fast: registry and module errors are fatal
//! - Nothing binds here; listeners bind when the service starts
//! - The store connects on first use, not at startup

use std::sync::Arc;

use crate::apps;
use crate::config::Config;
use crate::http::HttpServer;
use crate::lifecycle::{LifecycleError, Service};
use crate::rpc::RpcServer;
use crate::store::MongoStore;

/// The service as assembled for production.
pub type AppService = Service<HttpServer, RpcServer>;

/// Build the complete service for `config`.
pub fn bootstrap(config: &Config) -> Result<Arc<AppService>, LifecycleError> {
    let store = Arc::new(MongoStore::new(config.mongodb.clone()));

    let registry = apps::default_registry(config, store.clone())?;
    registry.init_all()?;

    let rpc = RpcServer::new(config, registry.rpc_router());
    let http = HttpServer::from_registry(config, &registry);

    tracing::debug!(
        http_address = %config.app.http.addr(),
        grpc_address = %config.app.grpc.addr(),
        "Service assembled"
    );

    let service = Service::new(Arc::new(http), Arc::new(rpc))
        .with_summary(registry.summary())
        .with_resource(store);
    Ok(Arc::new(service))
}
