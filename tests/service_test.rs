//! End to end: bootstrap the real service and drive it through a signal.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use mpaas::lifecycle::{bootstrap, LifecycleState, Signal};
use mpaas::rpc::RpcClient;

mod common;

#[tokio::test]
async fn test_serves_both_transports_until_signal() {
    let service = bootstrap(&common::test_config()).unwrap();
    let (tx, rx) = mpsc::channel(1);

    let serving = {
        let service = service.clone();
        tokio::spawn(async move { service.serve(rx).await })
    };

    let http_addr = tokio::time::timeout(Duration::from_secs(5), service.http().local_addr())
        .await
        .unwrap()
        .unwrap();
    let rpc_addr = tokio::time::timeout(Duration::from_secs(5), service.rpc().local_addr())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(service.state(), LifecycleState::Running);

    let body: Value = reqwest::get(format!("http://{}/mcenter/api/v1/health", http_addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "SERVING");

    let mut client = RpcClient::connect(rpc_addr).await.unwrap();
    let status = client.call("health.Check", json!({})).await.unwrap();
    assert_eq!(status["app"], "mcenter");
    drop(client);

    tx.send(Signal::Terminate).await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), serving)
        .await
        .expect("service did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(service.state(), LifecycleState::Stopped);
    // The HTTP listener is gone.
    assert!(reqwest::get(format!("http://{}/mcenter/api/v1/health", http_addr))
        .await
        .is_err());
}

#[tokio::test]
async fn test_module_summary_lists_health() {
    let config = common::test_config();
    let store = std::sync::Arc::new(mpaas::MongoStore::new(config.mongodb.clone()));
    let registry = mpaas::apps::default_registry(&config, store).unwrap();

    let summary = registry.summary();
    assert_eq!(summary.rpc, vec!["health"]);
    assert_eq!(summary.http, vec!["health"]);
    assert!(summary.internal.is_empty());
    assert!(registry.rpc_router().contains("health.Check"));
}
