//! Configuration loading from a TOML file or the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{Config, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown config type: {0}")]
    UnknownType(String),

    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from the source named on the command line.
///
/// `file` reads `path`, `env` reads the process environment. Any other kind,
/// `etcd` included, is rejected.
pub fn load(kind: &str, path: &Path) -> Result<Config, ConfigError> {
    match kind {
        "file" => load_config(path),
        "env" => from_env(),
        other => Err(ConfigError::UnknownType(other.to_string())),
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_toml_str(&content)
}

/// Parse and validate a TOML document. Missing keys take their defaults.
pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from the process environment.
pub fn from_env() -> Result<Config, ConfigError> {
    from_env_lookup(|key| std::env::var(key).ok())
}

/// Build a configuration from an environment lookup function.
///
/// Unset or empty variables leave the default in place.
pub fn from_env_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let mut config = Config::default();

    if let Some(name) = get("APP_NAME") {
        config.app.name = name;
    }
    if let Some(host) = get("HTTP_HOST") {
        config.app.http.host = host;
    }
    if let Some(port) = get("HTTP_PORT") {
        config.app.http.port = parse_port("HTTP_PORT", &port)?;
    }
    if let Some(host) = get("GRPC_HOST") {
        config.app.grpc.host = host;
    }
    if let Some(port) = get("GRPC_PORT") {
        config.app.grpc.port = parse_port("GRPC_PORT", &port)?;
    }

    if let Some(endpoints) = get("MONGO_ENDPOINTS") {
        config.mongodb.endpoints = endpoints
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(username) = get("MONGO_USERNAME") {
        config.mongodb.username = username;
    }
    if let Some(password) = get("MONGO_PASSWORD") {
        config.mongodb.password = password;
    }
    if let Some(database) = get("MONGO_DATABASE") {
        config.mongodb.database = database;
    }
    if let Some(auth_source) = get("MONGO_AUTH_SOURCE") {
        config.mongodb.auth_source = auth_source;
    }

    if let Some(level) = get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.log.format = match format.to_ascii_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            _ => {
                return Err(ConfigError::Env {
                    var: "LOG_FORMAT",
                    message: format!("expected text or json, got {:?}", format),
                })
            }
        };
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn parse_port(var: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        message: format!("invalid port {:?}", value),
    })
}
