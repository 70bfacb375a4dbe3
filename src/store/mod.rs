//! Document store handle.
//!
//! The store is created once at startup and shared through an `Arc`. The
//! first call to [`MongoStore::client`] connects; every later or concurrent
//! call observes the outcome of that single attempt.
//!
//! # Design Decisions
//! - The outcome is memoised, failures included: no automatic retry
//! - The whole attempt (connect and ping) is bounded by [`CONNECT_TIMEOUT`]
//! - The client is released by the lifecycle manager after both listeners stop

pub mod mongo;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::MongoConfig;
use crate::lifecycle::shutdown::{ReleaseError, Resource};

pub use mongo::{MongoConnector, CONNECT_TIMEOUT};

/// Errors raised while obtaining the store client.
///
/// Every variant names the endpoints involved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("invalid mongodb endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("new mongodb client({}) error, {message}", endpoints.join(","))]
    Connect {
        endpoints: Vec<String>,
        message: String,
    },

    #[error("ping mongodb server({}) error, {message}", endpoints.join(","))]
    Ping {
        endpoints: Vec<String>,
        message: String,
    },

    #[error("connect mongodb server({}) timed out after {timeout:?}", endpoints.join(","))]
    Timeout {
        endpoints: Vec<String>,
        timeout: Duration,
    },
}

/// Establishes and tears down store clients.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Client: Clone + Send + Sync + 'static;
    type Database: Send + 'static;

    async fn connect(&self, config: &MongoConfig) -> Result<Self::Client, StoreError>;

    fn database(&self, client: &Self::Client, name: &str) -> Self::Database;

    async fn close(&self, client: Self::Client);
}

/// Lazily connected, process-wide store handle.
pub struct MongoStore<C: Connect = MongoConnector> {
    config: MongoConfig,
    connector: C,
    timeout: Duration,
    client: OnceCell<Result<C::Client, StoreError>>,
    released: AtomicBool,
}

impl MongoStore<MongoConnector> {
    pub fn new(config: MongoConfig) -> Self {
        Self::with_connector(config, MongoConnector)
    }
}

impl<C: Connect> MongoStore<C> {
    pub fn with_connector(config: MongoConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            timeout: CONNECT_TIMEOUT,
            client: OnceCell::new(),
            released: AtomicBool::new(false),
        }
    }

    /// Override the overall bound on the connection attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// The shared client, connecting on first use.
    pub async fn client(&self) -> Result<C::Client, StoreError> {
        self.client
            .get_or_init(|| async {
                let attempt = self.connector.connect(&self.config);
                let result = match tokio::time::timeout(self.timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::Timeout {
                        endpoints: self.config.endpoints.clone(),
                        timeout: self.timeout,
                    }),
                };
                if let Err(e) = &result {
                    tracing::error!(error = %e, "Failed to connect to mongodb");
                }
                result
            })
            .await
            .clone()
    }

    /// The configured database on the shared client.
    pub async fn database(&self) -> Result<C::Database, StoreError> {
        let client = self.client().await?;
        Ok(self.connector.database(&client, &self.config.database))
    }

    /// Whether a connection attempt has completed, successfully or not.
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// Shut down the client if one was created. Later calls do nothing.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(Ok(client)) = self.client.get() {
            self.connector.close(client.clone()).await;
            tracing::info!("mongodb client released");
        }
    }
}

#[async_trait]
impl<C: Connect> Resource for MongoStore<C> {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn release(&self) -> Result<(), ReleaseError> {
        Self::release(self).await;
        Ok(())
    }
}
