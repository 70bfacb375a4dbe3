//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! --config-type file          --config-type env
//!     → loader.rs (TOML)          → loader.rs (APP_NAME, HTTP_PORT, ...)
//!     → validation.rs (semantic checks)
//!     → Config (validated, immutable)
//!     → passed by reference into every constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; nothing re-reads a global
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, ConfigError};
pub use schema::{
    AppConfig, Config, HttpConfig, LogConfig, LogFormat, MetricsConfig, MongoConfig, RpcConfig,
};
pub use validation::ValidationError;
