//! Configuration for registration and watching.
//!
//! Runtime structs ([`RegistrationConfig`], [`WatchConfig`]) carry
//! `Duration`s and sensible defaults. [`BeaconConfig`] is the on-disk TOML
//! form, with durations written as whole seconds:
//!
//! ```toml
//! [catalog]
//! address = "consul.internal:8500"
//! blocking_wait_secs = 20
//!
//! [registration]
//! service = "billing"
//! port = 8090
//! interval_secs = 3
//!
//! [registration.proxy]
//! destination_service_name = "db"
//! local_service_port = 5432
//!
//! [watch]
//! service = "ledger"
//! ```
//!
//! Environment overrides: `BEACON_CATALOG_ADDR`, `BEACON_TOKEN`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use beacon_catalog::HttpCatalogOptions;
use beacon_core::CatalogError;
use beacon_core::ProxyDefinition;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Default period between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// Fixed delay between registration attempts.
pub const DEFAULT_REGISTER_RETRY_DELAY: Duration = Duration::from_secs(12);

/// Bound on the best-effort deregistration at the end of a session.
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on one healthy-instance fetch.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before retrying a failed fetch.
pub const DEFAULT_WATCH_RETRY_DELAY: Duration = Duration::from_secs(15);

/// Environment variable overriding the catalog address.
pub const ENV_CATALOG_ADDR: &str = "BEACON_CATALOG_ADDR";

/// Environment variable overriding the catalog ACL token.
pub const ENV_TOKEN: &str = "BEACON_TOKEN";

// ============================================================================
// Errors
// ============================================================================

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or a required value is missing.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors building a catalog-backed handle or resolver.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

// ============================================================================
// Runtime Configuration
// ============================================================================

/// What to register and how often to heartbeat.
///
/// # Example
///
/// ```rust
/// use beacon_agent::config::RegistrationConfig;
/// use std::time::Duration;
///
/// let config = RegistrationConfig {
///     interval: Duration::from_secs(5),
///     ..RegistrationConfig::new("billing", 8090)
/// };
/// assert_eq!(config.retry_delay, Duration::from_secs(12));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfig {
    /// Service name registered in the catalog.
    pub service: String,

    /// Port the service listens on.
    pub port: u16,

    /// Advertised address; `None` lets the catalog client pick one.
    pub address: Option<String>,

    /// Tags attached to the registration.
    pub tags: Vec<String>,

    /// Registers a connect proxy for this destination instead of a typical service.
    pub proxy: Option<ProxyDefinition>,

    /// Heartbeat period. The check TTL is three of these.
    pub interval: Duration,

    /// Delay between a failed session and the next attempt.
    pub retry_delay: Duration,

    /// Bound on the deregistration performed when a session ends.
    pub cleanup_timeout: Duration,
}

impl RegistrationConfig {
    /// Creates a config with default timings.
    pub fn new(service: impl Into<String>, port: u16) -> Self {
        Self {
            service: service.into(),
            port,
            address: None,
            tags: Vec::new(),
            proxy: None,
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            retry_delay: DEFAULT_REGISTER_RETRY_DELAY,
            cleanup_timeout: DEFAULT_CLEANUP_TIMEOUT,
        }
    }

    /// Checks invariants the loops rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.trim().is_empty() {
            return Err(ConfigError::Invalid("service name is empty".to_string()));
        }
        if self.interval.as_secs() == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat interval must be at least one second".to_string(),
            ));
        }
        if self.retry_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "registration retry delay must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Timings of a service watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    /// Bound on one fetch.
    pub poll_timeout: Duration,
    /// Delay before retrying a failed fetch.
    pub retry_delay: Duration,
}

impl WatchConfig {
    /// Checks invariants the watcher relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "watch poll timeout must be greater than zero".to_string(),
            ));
        }
        if self.retry_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "watch retry delay must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            retry_delay: DEFAULT_WATCH_RETRY_DELAY,
        }
    }
}

// ============================================================================
// File Configuration
// ============================================================================

/// Top-level config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeaconConfig {
    pub catalog: CatalogSection,
    pub registration: RegistrationSection,
    pub watch: WatchSection,
}

/// `[catalog]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSection {
    pub address: Option<String>,
    pub token: Option<String>,
    pub host_address: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub blocking_wait_secs: Option<u64>,
}

/// `[registration]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrationSection {
    pub service: Option<String>,
    pub port: Option<u16>,
    pub address: Option<String>,
    pub tags: Vec<String>,
    pub interval_secs: u64,
    pub retry_delay_secs: u64,
    pub proxy: Option<ProxyDefinition>,
}

impl Default for RegistrationSection {
    fn default() -> Self {
        Self {
            service: None,
            port: None,
            address: None,
            tags: Vec::new(),
            interval_secs: DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
            retry_delay_secs: DEFAULT_REGISTER_RETRY_DELAY.as_secs(),
            proxy: None,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSection {
    pub service: Option<String>,
    pub poll_timeout_secs: u64,
    pub retry_delay_secs: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            service: None,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs(),
            retry_delay_secs: DEFAULT_WATCH_RETRY_DELAY.as_secs(),
        }
    }
}

impl BeaconConfig {
    /// Parses a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `path` if it exists, otherwise returns defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Applies `BEACON_CATALOG_ADDR` / `BEACON_TOKEN` from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`; empty values are ignored.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(address) = non_empty(ENV_CATALOG_ADDR) {
            self.catalog.address = Some(address);
        }
        if let Some(token) = non_empty(ENV_TOKEN) {
            self.catalog.token = Some(token);
        }
        self
    }

    /// Checks value ranges.
    ///
    /// A blocking wait is held by the agent for up to `wait + wait / 16`,
    /// which must stay below both the request timeout and the poll timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registration.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "registration.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.registration.retry_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "registration.retry_delay_secs must be greater than zero".to_string(),
            ));
        }
        if self.watch.poll_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "watch.poll_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.watch.retry_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "watch.retry_delay_secs must be greater than zero".to_string(),
            ));
        }
        if self.catalog.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "catalog.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(wait_secs) = self.catalog.blocking_wait_secs {
            let wait = Duration::from_secs(wait_secs);
            let held = wait + wait / 16;
            let request_timeout = self.catalog_options().request_timeout;
            let poll_timeout = Duration::from_secs(self.watch.poll_timeout_secs);
            let bound = request_timeout.min(poll_timeout);
            if held >= bound {
                return Err(ConfigError::Invalid(format!(
                    "catalog.blocking_wait_secs ({wait_secs}) plus jitter must be below \
                     the request timeout ({}s) and watch.poll_timeout_secs ({}s)",
                    request_timeout.as_secs(),
                    poll_timeout.as_secs()
                )));
            }
        }
        Ok(())
    }

    /// Catalog client options from the `[catalog]` section.
    pub fn catalog_options(&self) -> HttpCatalogOptions {
        let defaults = HttpCatalogOptions::default();
        HttpCatalogOptions {
            address: self.catalog.address.clone().unwrap_or(defaults.address),
            host_address: self.catalog.host_address.clone(),
            token: self.catalog.token.clone(),
            request_timeout: self
                .catalog
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            blocking_wait: self.catalog.blocking_wait_secs.map(Duration::from_secs),
            ..defaults
        }
    }

    /// Registration config from the `[registration]` section.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` if the service name or port is missing.
    pub fn registration_config(&self) -> Result<RegistrationConfig, ConfigError> {
        let section = &self.registration;
        let service = section
            .service
            .clone()
            .ok_or_else(|| ConfigError::Invalid("registration.service is required".to_string()))?;
        let port = section
            .port
            .ok_or_else(|| ConfigError::Invalid("registration.port is required".to_string()))?;

        let config = RegistrationConfig {
            address: section.address.clone(),
            tags: section.tags.clone(),
            proxy: section.proxy.clone(),
            interval: Duration::from_secs(section.interval_secs),
            retry_delay: Duration::from_secs(section.retry_delay_secs),
            ..RegistrationConfig::new(service, port)
        };
        config.validate()?;
        Ok(config)
    }

    /// Watch timings from the `[watch]` section.
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            poll_timeout: Duration::from_secs(self.watch.poll_timeout_secs),
            retry_delay: Duration::from_secs(self.watch.retry_delay_secs),
        }
    }
}
