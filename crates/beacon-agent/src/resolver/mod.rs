//! Healthy-instance discovery.
//!
//! A [`Resolver`] is bound to one service name at construction. Every
//! [`resolve`](Resolver::resolve) call yields an independent
//! [`ServiceWatcher`] with an empty snapshot.

mod diff;
mod watcher;

use std::sync::Arc;

use beacon_catalog::{HealthApi, HttpCatalog, HttpCatalogOptions};

pub use diff::diff;
pub use watcher::{ServiceWatcher, Watch, WatchError};

use crate::config::{SetupError, WatchConfig};

/// Factory of watchers for a fixed service.
#[derive(Clone)]
pub struct Resolver {
    health: Arc<dyn HealthApi>,
    service: String,
    config: WatchConfig,
}

impl Resolver {
    pub fn new(health: Arc<dyn HealthApi>, service: impl Into<String>) -> Self {
        Self::with_config(health, service, WatchConfig::default())
    }

    pub fn with_config(
        health: Arc<dyn HealthApi>,
        service: impl Into<String>,
        config: WatchConfig,
    ) -> Self {
        Self {
            health,
            service: service.into(),
            config,
        }
    }

    /// Builds a resolver over an HTTP catalog.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the catalog client cannot be built.
    pub fn http(
        options: HttpCatalogOptions,
        service: impl Into<String>,
        config: WatchConfig,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let catalog = HttpCatalog::new(options)?;
        Ok(Self::with_config(Arc::new(catalog), service, config))
    }

    /// The service every watcher from this resolver follows.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns a new watcher for the bound service.
    ///
    /// `_target` is accepted for interface compatibility and ignored; the
    /// watched service is always the one given at construction.
    pub fn resolve(&self, _target: &str) -> ServiceWatcher {
        ServiceWatcher::new(Arc::clone(&self.health), self.service.clone(), self.config)
    }
}
