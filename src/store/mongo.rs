//! MongoDB connector.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential, SelectionCriteria, ServerAddress};
use mongodb::{Client, Database};

use crate::config::MongoConfig;
use crate::store::{Connect, StoreError};

/// Bound on the connect and server selection steps of the driver.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects with the official driver and verifies the server with `ping`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

impl MongoConnector {
    /// Driver options for `config`.
    ///
    /// Credentials are attached only when both username and password are set.
    pub fn client_options(config: &MongoConfig) -> Result<ClientOptions, StoreError> {
        let hosts = config
            .endpoints
            .iter()
            .map(|endpoint| {
                ServerAddress::parse(endpoint).map_err(|e| StoreError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut options = ClientOptions::default();
        options.hosts = hosts;
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);

        if config.has_credentials() {
            options.credential = Some(
                Credential::builder()
                    .username(config.username.clone())
                    .password(config.password.clone())
                    .source(config.auth_source.clone())
                    .build(),
            );
        }

        Ok(options)
    }
}

#[async_trait]
impl Connect for MongoConnector {
    type Client = Client;
    type Database = Database;

    async fn connect(&self, config: &MongoConfig) -> Result<Client, StoreError> {
        let options = Self::client_options(config)?;
        let client = Client::with_options(options).map_err(|e| StoreError::Connect {
            endpoints: config.endpoints.clone(),
            message: e.to_string(),
        })?;

        // The driver connects lazily; ping forces server selection.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None::<SelectionCriteria>)
            .await
            .map_err(|e| StoreError::Ping {
                endpoints: config.endpoints.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(endpoints = ?config.endpoints, "Connected to mongodb");
        Ok(client)
    }

    fn database(&self, client: &Client, name: &str) -> Database {
        client.database(name)
    }

    async fn close(&self, client: Client) {
        client.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MongoConfig {
        MongoConfig {
            endpoints: vec!["db1:27017".into(), "db2:27018".into()],
            ..MongoConfig::default()
        }
    }

    #[test]
    fn anonymous_without_credentials() {
        let options = MongoConnector::client_options(&config()).unwrap();
        assert!(options.credential.is_none());
        assert_eq!(options.hosts.len(), 2);
        assert_eq!(options.connect_timeout, Some(CONNECT_TIMEOUT));
        assert_eq!(options.server_selection_timeout, Some(CONNECT_TIMEOUT));
    }

    #[test]
    fn username_alone_is_not_enough() {
        let config = MongoConfig {
            username: "admin".into(),
            ..config()
        };
        let options = MongoConnector::client_options(&config).unwrap();
        assert!(options.credential.is_none());
    }

    #[test]
    fn credentials_carry_auth_source() {
        let config = MongoConfig {
            username: "admin".into(),
            password: "secret".into(),
            auth_source: "users".into(),
            ..config()
        };
        let options = MongoConnector::client_options(&config).unwrap();
        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("admin"));
        assert_eq!(credential.password.as_deref(), Some("secret"));
        assert_eq!(credential.source.as_deref(), Some("users"));
    }

    #[test]
    fn bad_endpoint_rejected() {
        let config = MongoConfig {
            endpoints: vec!["db1:notaport".into()],
            ..MongoConfig::default()
        };
        let err = MongoConnector::client_options(&config).unwrap_err();
        assert!(matches!(err, StoreError::InvalidEndpoint { .. }));
        assert!(err.to_string().contains("db1:notaport"));
    }
}
