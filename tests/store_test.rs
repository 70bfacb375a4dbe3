//! Store connection against an unreachable endpoint.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use mpaas::config::loader::from_env_lookup;
use mpaas::store::{MongoConnector, MongoStore};

#[tokio::test]
async fn test_unreachable_endpoint_fails_fast_and_names_it() {
    let env: HashMap<&str, &str> = HashMap::from([("MONGO_ENDPOINTS", "127.0.0.1:1")]);
    let config = from_env_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

    // No username or password in the environment: anonymous options.
    assert!(!config.mongodb.has_credentials());
    assert!(MongoConnector::client_options(&config.mongodb)
        .unwrap()
        .credential
        .is_none());

    let store = MongoStore::new(config.mongodb.clone());
    let started = Instant::now();
    let err = store.client().await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(err.to_string().contains("127.0.0.1:1"), "{}", err);

    // The failure is remembered.
    let again = store.database().await.unwrap_err();
    assert_eq!(again, err);
    assert!(started.elapsed() < Duration::from_secs(10));
}
