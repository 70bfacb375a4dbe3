//! Module registry.
//!
//! Business modules are registered here before either transport is built.
//! The transports read the registry once, at construction:
//!
//! ```text
//! Registry
//!     → rpc modules      → RpcRouter (method table)
//!     → http modules     → axum Router nested under /{app}/api/v1/{module}
//!     → internal modules → initialised only, never exposed
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::rpc::RpcRouter;

/// Error returned by a module that fails to initialise.
#[derive(Debug, thiserror::Error)]
#[error("init module {module}: {message}")]
pub struct ModuleError {
    pub module: &'static str,
    pub message: String,
}

impl ModuleError {
    pub fn new(module: &'static str, message: impl Into<String>) -> Self {
        Self {
            module,
            message: message.into(),
        }
    }
}

/// Errors raised while registering modules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} module {name} registered twice")]
    Duplicate { kind: ModuleKind, name: &'static str },
}

/// Which transport a module is exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Rpc,
    Http,
    Internal,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModuleKind::Rpc => "grpc",
            ModuleKind::Http => "http",
            ModuleKind::Internal => "internal",
        })
    }
}

/// A unit of business logic.
pub trait Module: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Called once before the transports are built.
    fn init(&self) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// A module reachable over RPC.
pub trait RpcModule: Module {
    /// Add this module's methods, conventionally named `{name}.{Method}`.
    fn register(&self, router: &mut RpcRouter);
}

/// A module reachable over HTTP.
pub trait HttpModule: Module {
    /// Routes relative to the module's base path.
    fn routes(&self) -> axum::Router;
}

#[derive(Default)]
pub struct Registry {
    rpc: Vec<Arc<dyn RpcModule>>,
    http: Vec<Arc<dyn HttpModule>>,
    internal: Vec<Arc<dyn Module>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_rpc(&mut self, module: Arc<dyn RpcModule>) -> Result<(), RegistryError> {
        ensure_unique(ModuleKind::Rpc, self.rpc.iter().map(|m| m.name()), module.name())?;
        self.rpc.push(module);
        Ok(())
    }

    pub fn register_http(&mut self, module: Arc<dyn HttpModule>) -> Result<(), RegistryError> {
        ensure_unique(ModuleKind::Http, self.http.iter().map(|m| m.name()), module.name())?;
        self.http.push(module);
        Ok(())
    }

    pub fn register_internal(&mut self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        ensure_unique(
            ModuleKind::Internal,
            self.internal.iter().map(|m| m.name()),
            module.name(),
        )?;
        self.internal.push(module);
        Ok(())
    }

    /// Initialise every module. A module exposed on both transports is
    /// initialised once.
    pub fn init_all(&self) -> Result<(), ModuleError> {
        let mut done = BTreeSet::new();
        let modules = self
            .internal
            .iter()
            .map(|m| m.as_ref() as &dyn Module)
            .chain(self.rpc.iter().map(|m| m.as_ref() as &dyn Module))
            .chain(self.http.iter().map(|m| m.as_ref() as &dyn Module));

        for module in modules {
            if !done.insert(module.name()) {
                continue;
            }
            module.init()?;
            tracing::debug!(module = module.name(), "Module initialised");
        }
        Ok(())
    }

    /// Build the RPC method table from every RPC module.
    pub fn rpc_router(&self) -> RpcRouter {
        let mut router = RpcRouter::new();
        for module in &self.rpc {
            module.register(&mut router);
        }
        router
    }

    /// Build the HTTP routes from every HTTP module.
    pub fn http_router(&self, app_name: &str) -> axum::Router {
        self.http
            .iter()
            .fold(axum::Router::new(), |router, module| {
                router.nest(&module_base_path(app_name, module.name()), module.routes())
            })
    }

    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary {
            rpc: self.rpc.iter().map(|m| m.name()).collect(),
            http: self.http.iter().map(|m| m.name()).collect(),
            internal: self.internal.iter().map(|m| m.name()).collect(),
        }
    }
}

/// Base path under which an HTTP module's routes are nested.
pub fn module_base_path(app_name: &str, module: &str) -> String {
    format!("/{}/api/v1/{}", app_name, module)
}

fn ensure_unique<'a>(
    kind: ModuleKind,
    mut existing: impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<(), RegistryError> {
    if existing.any(|n| n == name) {
        Err(RegistryError::Duplicate { kind, name })
    } else {
        Ok(())
    }
}

/// Names of the loaded modules, per transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSummary {
    pub rpc: Vec<&'static str>,
    pub http: Vec<&'static str>,
    pub internal: Vec<&'static str>,
}
