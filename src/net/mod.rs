//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured host:port
//!     → listener.rs (bind, accept loop, connection limits)
//!     → connection.rs (connection ids, open-connection accounting)
//!     → Hand off to the HTTP or RPC transport
//! ```
//!
//! Both transports implement [`Transport`], the seam the lifecycle manager
//! drives: `start` blocks while serving, `stop` drains within a bound.

pub mod connection;
pub mod listener;
pub mod transport;

pub use transport::{Transport, TransportError};
