//! Beacon Core - Shared types for catalog registration and discovery
//!
//! This crate provides the domain types shared between the catalog
//! client (`beacon-catalog`) and the control loops (`beacon-agent`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod health;
pub mod id;
pub mod instance;
pub mod registration;

// Re-exports for convenience
pub use error::{CatalogError, CatalogResult, ProbeError};
pub use health::HealthStatus;
pub use id::{CheckId, IdGenerator, ServiceId};
pub use instance::{Instance, Update, UpdateKind};
pub use registration::{
    format_seconds, CheckDefinition, ProxyDefinition, Registration, ServiceKind, DEREGISTER_MULTIPLIER,
    TTL_MULTIPLIER,
};
