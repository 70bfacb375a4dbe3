//! Modules shipped with the service.

pub mod health;

use std::sync::Arc;

use crate::config::Config;
use crate::registry::{Registry, RegistryError};
use crate::store::{Connect, MongoStore};

pub use health::HealthModule;

/// Registry holding every built-in module.
pub fn default_registry<C: Connect>(
    config: &Config,
    store: Arc<MongoStore<C>>,
) -> Result<Registry, RegistryError> {
    let health = Arc::new(HealthModule::new(config.app.name.clone()).with_store(store));

    let mut registry = Registry::new();
    registry.register_rpc(health.clone())?;
    registry.register_http(health)?;
    Ok(registry)
}
