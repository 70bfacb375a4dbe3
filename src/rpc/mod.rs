//! RPC transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept, length-delimited frames, per-call tasks)
//!     → interceptor.rs (Recovery → TraceCall → user interceptors)
//!     → router.rs (method table filled by registered modules)
//!     → handler
//!     → response frame, matched to the request by id
//! ```
//!
//! # Design Decisions
//! - Calls on one connection run concurrently; responses may be reordered
//! - A panicking handler fails only its own call
//! - Stop drains in-flight calls within a bound, then closes

pub mod client;
pub mod interceptor;
pub mod protocol;
pub mod router;
pub mod server;

pub use client::{ClientError, RpcClient};
pub use interceptor::{RecoveryLayer, TraceCallLayer};
pub use protocol::{Code, RpcRequest, RpcResponse, RpcStatus};
pub use router::RpcRouter;
pub use server::{RpcServer, RpcServerBuilder, RpcService};
