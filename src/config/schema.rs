//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Application identity and listener addresses.
    pub app: AppConfig,

    /// Document store connection parameters.
    pub mongodb: MongoConfig,

    /// Logging settings.
    pub log: LogConfig,

    /// Metrics exporter settings.
    pub metrics: MetricsConfig,
}

/// Application identity and transport settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Application name, used in logs, HTTP paths and the API docs.
    pub name: String,

    /// HTTP listener address.
    pub http: HttpConfig,

    /// RPC listener address.
    pub grpc: RpcConfig,

    /// Per-request timeout for the HTTP transport, in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound on each listener's graceful stop, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "mcenter".to_string(),
            http: HttpConfig::default(),
            grpc: RpcConfig::default(),
            request_timeout_secs: 30,
            drain_timeout_secs: 30,
        }
    }
}

/// HTTP listener address.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,

    /// Accepts `port = 8020` as well as `port = "8020"`.
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
}

impl HttpConfig {
    /// Canonical `host:port` string used to listen and dial.
    pub fn addr(&self) -> String {
        format_addr(&self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8020,
        }
    }
}

/// RPC listener settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RpcConfig {
    pub host: String,

    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,

    /// Maximum concurrent RPC connections (backpressure).
    pub max_connections: usize,
}

impl RpcConfig {
    pub fn addr(&self) -> String {
        format_addr(&self.host, self.port)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18020,
            max_connections: 10_000,
        }
    }
}

/// Document store connection parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MongoConfig {
    /// Server addresses (e.g., "127.0.0.1:27017").
    pub endpoints: Vec<String>,

    pub username: String,

    pub password: String,

    /// Database resolved by `MongoStore::database`.
    pub database: String,

    /// Database used for authentication.
    pub auth_source: String,
}

impl MongoConfig {
    /// Credentials are only attached when both username and password are set.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["127.0.0.1:27017".to_string()],
            username: String::new(),
            password: String::new(),
            database: "mpaas".to_string(),
            auth_source: "mpaas".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus scrape endpoint.
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Join host and port, bracketing bare IPv6 literals.
pub fn format_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {:?}", text))),
    }
}
