//! Method table for the RPC transport.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tower::Service;

use crate::rpc::protocol::{RpcRequest, RpcStatus};

/// Future returned by every layer of the RPC dispatch chain.
pub type RpcFuture = BoxFuture<'static, Result<Value, RpcStatus>>;

type Handler = Arc<dyn Fn(RpcRequest) -> RpcFuture + Send + Sync>;

/// Collects method handlers while modules register themselves.
#[derive(Default)]
pub struct RpcRouter {
    methods: HashMap<String, Handler>,
}

impl RpcRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler working on the raw request.
    pub fn route<F, Fut>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(RpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcStatus>> + Send + 'static,
    {
        let method = method.into();
        let boxed: Handler = Arc::new(move |req: RpcRequest| Box::pin(handler(req)) as RpcFuture);
        if self.methods.insert(method.clone(), boxed).is_some() {
            tracing::warn!(method = %method, "RPC method registered twice, keeping the last handler");
        }
        self
    }

    /// Register a handler with typed payload and result.
    ///
    /// A payload that does not decode into `Req` is answered with
    /// `INVALID_ARGUMENT` without calling the handler.
    pub fn route_typed<Req, Resp, F, Fut>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, RpcStatus>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.route(method, move |req: RpcRequest| {
            let handler = handler.clone();
            async move {
                let input: Req = serde_json::from_value(req.payload)
                    .map_err(|e| RpcStatus::invalid_argument(format!("decode payload: {}", e)))?;
                let output = (*handler)(input).await?;
                serde_json::to_value(output)
                    .map_err(|e| RpcStatus::internal(format!("encode result: {}", e)))
            }
        })
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Freeze the table into the innermost service of the dispatch chain.
    pub fn into_service(self) -> Dispatch {
        Dispatch {
            methods: Arc::new(self.methods),
        }
    }
}

/// Looks up the handler for a request and invokes it.
#[derive(Clone)]
pub struct Dispatch {
    methods: Arc<HashMap<String, Handler>>,
}

impl Service<RpcRequest> for Dispatch {
    type Response = Value;
    type Error = RpcStatus;
    type Future = RpcFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        match self.methods.get(&req.method) {
            Some(handler) => handler(req),
            None => Box::pin(future::ready(Err(RpcStatus::unimplemented(&req.method)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::protocol::Code;
    use serde::Deserialize;
    use serde_json::json;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Echo {
        text: String,
    }

    fn router() -> RpcRouter {
        let mut router = RpcRouter::new();
        router
            .route("test.Raw", |req: RpcRequest| async move { Ok(json!({"id": req.id})) })
            .route_typed("test.Echo", |input: Echo| async move {
                Ok::<_, RpcStatus>(input.text.to_uppercase())
            });
        router
    }

    #[tokio::test]
    async fn dispatches_registered_methods() {
        let service = router().into_service();

        let raw = service
            .clone()
            .oneshot(RpcRequest::new(9, "test.Raw", Value::Null))
            .await
            .unwrap();
        assert_eq!(raw, json!({"id": 9}));

        let echo = service
            .oneshot(RpcRequest::new(1, "test.Echo", json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(echo, json!("HI"));
    }

    #[tokio::test]
    async fn unknown_method_is_unimplemented() {
        let err = router()
            .into_service()
            .oneshot(RpcRequest::new(1, "test.Missing", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::Unimplemented);
        assert!(err.message.contains("test.Missing"));
    }

    #[tokio::test]
    async fn bad_payload_is_invalid_argument() {
        let err = router()
            .into_service()
            .oneshot(RpcRequest::new(1, "test.Echo", json!({"text": 5})))
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);
    }

    #[test]
    fn lists_methods_sorted() {
        assert_eq!(router().methods(), vec!["test.Echo", "test.Raw"]);
        assert!(router().contains("test.Raw"));
    }
}
