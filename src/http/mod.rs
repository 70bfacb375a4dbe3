//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → SetRequestId → Trace → PropagateRequestId → Timeout → CatchPanic
//!     → /apidocs.json, or a module router under /{app}/api/v1/{module}
//!     → Send to client
//! ```

pub mod apidocs;
pub mod server;

pub use apidocs::ApiDocs;
pub use server::HttpServer;
