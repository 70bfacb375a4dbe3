//! Multi-protocol service bootstrap.
//!
//! Business modules register with a [`registry::Registry`]; the lifecycle
//! manager serves them over HTTP and RPC and shuts both down in order.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod rpc;

// Modules and their dependencies
pub mod apps;
pub mod registry;
pub mod store;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod version;

pub use config::Config;
pub use http::HttpServer;
pub use lifecycle::{bootstrap, LifecycleState, Service};
pub use rpc::RpcServer;
pub use store::MongoStore;
