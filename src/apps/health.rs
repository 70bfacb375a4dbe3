//! Built-in health module.
//!
//! Exposed on both transports:
//! - RPC `health.Check`
//! - HTTP `GET /{app}/api/v1/health`
//!
//! A plain check never touches the store. With `deep` set, the store
//! client is obtained (connecting on first use) and its state reported.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::registry::{HttpModule, Module, RpcModule};
use crate::rpc::{RpcRouter, RpcStatus};
use crate::store::{Connect, MongoStore};
use crate::version;

pub const NAME: &str = "health";

/// Something whose availability the health check can report.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn probe(&self) -> Result<(), String>;
}

#[async_trait]
impl<C: Connect> Probe for MongoStore<C> {
    async fn probe(&self) -> Result<(), String> {
        self.client().await.map(|_| ()).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub deep: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServingStatus {
    Serving,
    NotServing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ServingStatus,
    pub app: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

#[derive(Clone)]
pub struct HealthModule {
    app_name: String,
    store: Option<Arc<dyn Probe>>,
}

impl HealthModule {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Probe>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn check(&self, request: CheckRequest) -> HealthStatus {
        let mut status = HealthStatus {
            status: ServingStatus::Serving,
            app: self.app_name.clone(),
            version: version::short().to_string(),
            store: None,
        };

        if request.deep {
            let store = match &self.store {
                None => "not configured".to_string(),
                Some(probe) => match probe.probe().await {
                    Ok(()) => "ok".to_string(),
                    Err(e) => {
                        status.status = ServingStatus::NotServing;
                        e
                    }
                },
            };
            status.store = Some(store);
        }
        status
    }
}

impl Module for HealthModule {
    fn name(&self) -> &'static str {
        NAME
    }
}

impl RpcModule for HealthModule {
    fn register(&self, router: &mut RpcRouter) {
        let module = Arc::new(self.clone());
        router.route_typed("health.Check", move |request: Option<CheckRequest>| {
            let module = module.clone();
            async move { Ok::<_, RpcStatus>(module.check(request.unwrap_or_default()).await) }
        });
    }
}

impl HttpModule for HealthModule {
    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(check_handler))
            .with_state(Arc::new(self.clone()))
    }
}

async fn check_handler(
    State(module): State<Arc<HealthModule>>,
    Query(request): Query<CheckRequest>,
) -> (StatusCode, Json<HealthStatus>) {
    let status = module.check(request).await;
    let code = match status.status {
        ServingStatus::Serving => StatusCode::OK,
        ServingStatus::NotServing => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcRequest;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Down;

    #[async_trait]
    impl Probe for Down {
        async fn probe(&self) -> Result<(), String> {
            Err("ping mongodb server(127.0.0.1:1) error".into())
        }
    }

    #[tokio::test]
    async fn shallow_check_skips_store() {
        let module = HealthModule::new("mcenter").with_store(Arc::new(Down));
        let status = module.check(CheckRequest::default()).await;
        assert_eq!(status.status, ServingStatus::Serving);
        assert_eq!(status.app, "mcenter");
        assert!(status.store.is_none());
    }

    #[tokio::test]
    async fn deep_check_reports_store_failure() {
        let module = HealthModule::new("mcenter").with_store(Arc::new(Down));
        let status = module.check(CheckRequest { deep: true }).await;
        assert_eq!(status.status, ServingStatus::NotServing);
        assert!(status.store.unwrap().contains("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn rpc_check_accepts_missing_payload() {
        let mut router = RpcRouter::new();
        HealthModule::new("mcenter").register(&mut router);

        let value = router
            .into_service()
            .oneshot(RpcRequest::new(1, "health.Check", Value::Null))
            .await
            .unwrap();
        assert_eq!(value["status"], json!("SERVING"));
        assert_eq!(value["app"], json!("mcenter"));
    }
}
