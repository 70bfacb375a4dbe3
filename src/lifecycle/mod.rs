//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Store handle → Registry → init modules → HTTP + RPC listeners
//!
//! Running (service.rs):
//!     RPC start on its own task, HTTP start on the caller's task
//!
//! Shutdown (service.rs, shutdown.rs):
//!     Signal received → stop RPC → stop HTTP → release resources
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/SIGHUP/SIGQUIT → one shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: RPC strictly before HTTP, never concurrently
//! - A failed stop never skips the next one
//! - Each listener bounds its own drain; no outer timeout here

pub mod service;
pub mod shutdown;
pub mod signals;
pub mod startup;

use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::net::{Transport, TransportError};
use crate::registry::{ModuleError, RegistryError};

pub use service::{LifecycleState, Service};
pub use shutdown::{ReleaseError, Resource};
pub use signals::Signal;
pub use startup::{bootstrap, AppService};

/// Errors that end the process.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("start http service: {0}")]
    Http(#[source] TransportError),

    #[error("install signal handlers: {0}")]
    Signals(#[from] io::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// Install OS signal handlers and serve until shutdown completes.
pub async fn run<H: Transport, R: Transport>(service: Arc<Service<H, R>>) -> Result<(), LifecycleError> {
    let (tx, rx) = mpsc::channel(1);
    let forwarder = signals::forward(tx)?;

    let result = service.serve(rx).await;
    forwarder.abort();
    result
}
