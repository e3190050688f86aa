//! Beacon Agent - keep a service registered, watch another one
//!
//! Two independent control loops over the catalog traits from
//! `beacon-catalog`:
//!
//! ```text
//!  caller ──start──▶ ServiceHandle ──spawn──▶ RegistrationSupervisor
//!                                                    │ (fixed retry delay)
//!                                                    ▼
//!                                            RegistrationSession
//!                                   register ─▶ heartbeat ticks ─▶ deregister
//!
//!  caller ──resolve──▶ Resolver ──▶ ServiceWatcher ──poll──▶ HealthApi
//!                                          │
//!                                          ▼
//!                                   diff(previous, latest) ─▶ Vec<Update>
//! ```
//!
//! Neither loop gives up on its own: catalog failures are logged and
//! retried until the owner closes the handle or watcher.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! outside tests.

pub mod config;
pub mod registration;
pub mod resolver;

pub use config::{BeaconConfig, ConfigError, RegistrationConfig, SetupError, WatchConfig};
pub use registration::{
    register, FnProbe, HealthProbe, NoopProbe, RegistrationSession, RegistrationSupervisor,
    ServiceHandle, TcpProbe,
};
pub use resolver::{diff, Resolver, ServiceWatcher, Watch, WatchError};
