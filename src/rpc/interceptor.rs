//! Interceptors wrapping RPC dispatch.
//!
//! Interceptors are tower layers over the [`Dispatch`](crate::rpc::router::Dispatch)
//! service. The server always composes the chain as
//!
//! ```text
//! Recovery → TraceCall → user interceptors (registration order) → handler
//! ```
//!
//! so a panic anywhere below `Recovery` becomes an `INTERNAL` status for
//! that single call.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::{self, FutureExt};
use serde_json::Value;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

use crate::observability::metrics;
use crate::rpc::protocol::{RpcRequest, RpcStatus};
use crate::rpc::router::RpcFuture;

/// Layer producing [`Recovery`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryLayer;

impl<S> Layer<S> for RecoveryLayer {
    type Service = Recovery<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Recovery { inner }
    }
}

/// Converts panics from the wrapped service into `INTERNAL` errors.
///
/// Both panics raised while building the future and panics raised while
/// polling it are caught.
#[derive(Debug, Clone)]
pub struct Recovery<S> {
    inner: S,
}

impl<S> Service<RpcRequest> for Recovery<S>
where
    S: Service<RpcRequest, Response = Value, Error = RpcStatus>,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = RpcStatus;
    type Future = RpcFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        let method = req.method.clone();
        let inner = &mut self.inner;

        match std::panic::catch_unwind(AssertUnwindSafe(|| inner.call(req))) {
            Ok(fut) => Box::pin(async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(recovered(&method, panic)),
                }
            }),
            Err(panic) => Box::pin(future::ready(Err(recovered(&method, panic)))),
        }
    }
}

fn recovered(method: &str, panic: Box<dyn Any + Send>) -> RpcStatus {
    let message = panic_message(panic.as_ref());
    tracing::error!(method = %method, panic = %message, "Recovered from panic in RPC handler");
    metrics::record_rpc_panic(method);
    RpcStatus::internal(format!("internal error: {}", message))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Layer producing [`TraceCall`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceCallLayer;

impl<S> Layer<S> for TraceCallLayer {
    type Service = TraceCall<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceCall { inner }
    }
}

/// Runs each call in its own span and records call metrics.
#[derive(Debug, Clone)]
pub struct TraceCall<S> {
    inner: S,
}

impl<S> Service<RpcRequest> for TraceCall<S>
where
    S: Service<RpcRequest, Response = Value, Error = RpcStatus>,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = RpcStatus;
    type Future = RpcFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        let method = req.method.clone();
        let span = tracing::info_span!(
            "rpc_call",
            call_id = %Uuid::new_v4(),
            request_id = req.id,
            method = %method
        );
        let started = Instant::now();
        let fut = span.in_scope(|| self.inner.call(req));

        Box::pin(
            async move {
                let result = fut.await;
                let code = match &result {
                    Ok(_) => "OK",
                    Err(status) => status.code.as_str(),
                };
                tracing::debug!(
                    code,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "RPC call finished"
                );
                metrics::record_rpc_call(&method, code, started);
                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::protocol::Code;
    use crate::rpc::router::RpcRouter;
    use serde_json::json;
    use tower::{ServiceBuilder, ServiceExt};

    fn router() -> RpcRouter {
        let mut router = RpcRouter::new();
        router
            .route("t.Ok", |_req: RpcRequest| async { Ok(json!("fine")) })
            .route("t.PanicInFuture", |_req: RpcRequest| async { explode() });
        router
    }

    fn explode() -> Result<Value, RpcStatus> {
        panic!("boom")
    }

    #[tokio::test]
    async fn panic_while_polling_becomes_internal() {
        let service = ServiceBuilder::new()
            .layer(RecoveryLayer)
            .service(router().into_service());

        let err = service
            .clone()
            .oneshot(RpcRequest::new(1, "t.PanicInFuture", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::Internal);
        assert!(err.message.contains("boom"));

        // The same service keeps answering.
        let ok = service
            .oneshot(RpcRequest::new(2, "t.Ok", Value::Null))
            .await
            .unwrap();
        assert_eq!(ok, json!("fine"));
    }

    #[derive(Clone)]
    struct PanicOnCall;

    impl Service<RpcRequest> for PanicOnCall {
        type Response = Value;
        type Error = RpcStatus;
        type Future = RpcFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), RpcStatus>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: RpcRequest) -> RpcFuture {
            std::panic::panic_any(String::from("panicked before returning a future"))
        }
    }

    #[tokio::test]
    async fn panic_while_calling_becomes_internal() {
        let err = RecoveryLayer
            .layer(PanicOnCall)
            .oneshot(RpcRequest::new(1, "t.Any", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::Internal);
        assert!(err.message.contains("panicked before returning a future"));
    }

    #[tokio::test]
    async fn trace_call_passes_results_through() {
        let service = ServiceBuilder::new()
            .layer(TraceCallLayer)
            .service(router().into_service());

        let err = service
            .oneshot(RpcRequest::new(1, "t.Missing", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::Unimplemented);
    }

    #[test]
    fn panic_messages() {
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
    }
}
