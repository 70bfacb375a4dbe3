//! Configuration validation.
//!
//! Serde handles the syntax; this module checks the values. Every violation
//! is collected so an operator can fix a config file in one pass.

use std::net::SocketAddr;

use crate::config::schema::Config;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("mongodb.endpoints[{index}] is blank")]
    BlankEndpoint { index: usize },

    #[error("metrics.address {value:?} is not a socket address")]
    MetricsAddress { value: String },

    #[error("app.name {value:?} may only contain ASCII letters, digits, '-', '_' and '.'")]
    AppName { value: String },
}

/// The app name becomes a literal URL path segment, so it may not carry
/// separators, route parameters or wildcards.
fn is_path_segment(name: &str) -> bool {
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Validate a loaded configuration.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app.name.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "app.name" });
    } else if !is_path_segment(&config.app.name) || matches!(config.app.name.as_str(), "." | "..") {
        errors.push(ValidationError::AppName {
            value: config.app.name.clone(),
        });
    }
    if config.app.http.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "app.http.host" });
    }
    if config.app.grpc.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "app.grpc.host" });
    }
    if config.app.grpc.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "app.grpc.max_connections" });
    }
    if config.app.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "app.request_timeout_secs" });
    }
    if config.app.drain_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "app.drain_timeout_secs" });
    }

    if config.mongodb.endpoints.is_empty() {
        errors.push(ValidationError::Empty { field: "mongodb.endpoints" });
    }
    for (index, endpoint) in config.mongodb.endpoints.iter().enumerate() {
        if endpoint.trim().is_empty() {
            errors.push(ValidationError::BlankEndpoint { index });
        }
    }
    if config.mongodb.database.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "mongodb.database" });
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress {
            value: config.metrics.address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
