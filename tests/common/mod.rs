//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mpaas::config::Config;
use mpaas::lifecycle::{ReleaseError, Resource};
use mpaas::net::{Transport, TransportError};

/// Default config with both listeners on ephemeral ports.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.app.http.port = 0;
    config.app.grpc.port = 0;
    config.app.drain_timeout_secs = 5;
    config
}

/// Ordered record of lifecycle calls shared between mocks.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    /// Poll until `entry` shows up.
    pub async fn wait_for(&self, entry: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.position(entry).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{} never logged, got {:?}", entry, self.entries()));
    }
}

/// A transport that serves until stopped, recording every call.
pub struct MockTransport {
    name: &'static str,
    log: CallLog,
    stopped: CancellationToken,
    fail_start: bool,
    fail_stop: bool,
    stop_delay: Duration,
}

impl MockTransport {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: log.clone(),
            stopped: CancellationToken::new(),
            fail_start: false,
            fail_stop: false,
            stop_delay: Duration::ZERO,
        }
    }

    /// `start` fails immediately with a bind error.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// `stop` reports a drain timeout (after actually stopping).
    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.log.push(format!("{}.start", self.name));
        if self.fail_start {
            return Err(TransportError::Bind {
                addr: "127.0.0.1:1".into(),
                source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
            });
        }
        self.stopped.cancelled().await;
        Err(TransportError::Closed)
    }

    async fn stop(&self) -> Result<(), TransportError> {
        tokio::time::sleep(self.stop_delay).await;
        self.log.push(format!("{}.stop", self.name));
        self.stopped.cancel();
        if self.fail_stop {
            Err(TransportError::DrainTimeout(Duration::from_secs(1)))
        } else {
            Ok(())
        }
    }
}

/// A resource that records its release.
pub struct MockResource {
    log: CallLog,
}

impl MockResource {
    pub fn new(log: &CallLog) -> Self {
        Self { log: log.clone() }
    }
}

#[async_trait]
impl Resource for MockResource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn release(&self) -> Result<(), ReleaseError> {
        self.log.push("resource.release");
        Ok(())
    }
}
