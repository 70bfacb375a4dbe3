//! Lifecycle ordering and failure isolation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use mpaas::lifecycle::{LifecycleError, LifecycleState, Service, Signal};

mod common;

use common::{CallLog, MockResource, MockTransport};

type MockService = Service<MockTransport, MockTransport>;

fn service(http: MockTransport, rpc: MockTransport, log: &CallLog) -> Arc<MockService> {
    Arc::new(Service::new(Arc::new(http), Arc::new(rpc)).with_resource(Arc::new(MockResource::new(log))))
}

async fn serve_until_signal(
    service: Arc<MockService>,
    log: &CallLog,
    signals: &[Signal],
) -> Result<(), LifecycleError> {
    // Room for every signal, so none is dropped before the service reads it.
    let (tx, rx) = mpsc::channel(signals.len().max(1));
    let serving = {
        let service = service.clone();
        tokio::spawn(async move { service.serve(rx).await })
    };

    log.wait_for("http.start").await;
    log.wait_for("grpc.start").await;
    for signal in signals {
        tx.try_send(*signal).expect("signal queued");
    }

    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("serve did not return")
        .unwrap()
}

#[tokio::test]
async fn test_rpc_stops_before_http() {
    let log = CallLog::default();
    // RPC is the slow one; ordering must not depend on speed.
    let rpc = MockTransport::new("grpc", &log).stop_delay(Duration::from_millis(100));
    let http = MockTransport::new("http", &log);
    let service = service(http, rpc, &log);

    serve_until_signal(service.clone(), &log, &[Signal::Terminate])
        .await
        .unwrap();

    let rpc_stop = log.position("grpc.stop").unwrap();
    let http_stop = log.position("http.stop").unwrap();
    let release = log.position("resource.release").unwrap();
    assert!(rpc_stop < http_stop);
    assert!(http_stop < release);
    assert_eq!(service.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_http_stop_runs_when_rpc_stop_fails() {
    let log = CallLog::default();
    let rpc = MockTransport::new("grpc", &log).failing_stop();
    let http = MockTransport::new("http", &log);

    serve_until_signal(service(http, rpc, &log), &log, &[Signal::Interrupt])
        .await
        .unwrap();

    assert_eq!(log.count("grpc.stop"), 1);
    assert_eq!(log.count("http.stop"), 1);
    assert_eq!(log.count("resource.release"), 1);
}

#[tokio::test]
async fn test_two_signals_shut_down_once() {
    let log = CallLog::default();
    let rpc = MockTransport::new("grpc", &log);
    let http = MockTransport::new("http", &log);
    let service = service(http, rpc, &log);

    serve_until_signal(service.clone(), &log, &[Signal::Hangup, Signal::Quit])
        .await
        .unwrap();
    service.shutdown().await;

    assert_eq!(log.count("grpc.stop"), 1);
    assert_eq!(log.count("http.stop"), 1);
    assert_eq!(log.count("resource.release"), 1);
}

#[tokio::test]
async fn test_http_start_failure_propagates() {
    let log = CallLog::default();
    let rpc = MockTransport::new("grpc", &log);
    let http = MockTransport::new("http", &log).failing_start();
    let service = service(http, rpc, &log);

    let (_tx, rx) = mpsc::channel(1);
    let err = tokio::time::timeout(Duration::from_secs(5), service.serve(rx))
        .await
        .expect("serve did not return")
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Http(_)));
    // The rest of the service is still torn down.
    assert_eq!(log.count("grpc.stop"), 1);
    assert_eq!(log.count("resource.release"), 1);
    assert_eq!(service.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_rpc_start_failure_is_only_logged() {
    let log = CallLog::default();
    let rpc = MockTransport::new("grpc", &log).failing_start();
    let http = MockTransport::new("http", &log);
    let service = service(http, rpc, &log);

    serve_until_signal(service.clone(), &log, &[Signal::Terminate])
        .await
        .unwrap();

    // HTTP kept serving until the signal.
    assert!(log.position("http.stop").is_some());
}

#[tokio::test]
async fn test_http_closed_is_not_a_start_failure() {
    let log = CallLog::default();
    let service = service(
        MockTransport::new("http", &log),
        MockTransport::new("grpc", &log),
        &log,
    );

    let starting = {
        let service = service.clone();
        tokio::spawn(async move { service.start().await })
    };
    log.wait_for("http.start").await;
    assert_eq!(service.state(), LifecycleState::Running);

    service.shutdown().await;
    starting.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_before_start() {
    let log = CallLog::default();
    let service = service(
        MockTransport::new("http", &log),
        MockTransport::new("grpc", &log),
        &log,
    );
    assert_eq!(service.state(), LifecycleState::Constructed);

    service.shutdown().await;
    assert_eq!(service.state(), LifecycleState::Stopped);

    // A late start neither serves nor fails.
    service.start().await.unwrap();
    assert_eq!(log.count("http.start"), 0);
}
