//! Beacon Catalog - client side of the service catalog
//!
//! This crate is the narrow collaborator the control loops depend on:
//! - [`AgentApi`] - register, deregister and heartbeat a TTL check
//! - [`HealthApi`] - list healthy instances of a service
//!
//! [`HttpCatalog`] implements both against a Consul-compatible agent HTTP
//! API, and additionally exposes the connect read endpoints (authorize,
//! CA leaf, CA roots).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────────┐
//! │  beacon-agent loops  │──────▶│  AgentApi / HealthApi traits │
//! └──────────────────────┘        └──────────────┬───────────────┘
//!                                                │
//!                                                ▼
//!                                  ┌──────────────────────────┐
//!                                  │  HttpCatalog (reqwest)   │
//!                                  │  PUT  /v1/agent/...      │
//!                                  │  GET  /v1/health/...     │
//!                                  └──────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! outside tests. Every transport and decode failure maps to a
//! [`CatalogError`](beacon_core::CatalogError).

pub mod api;
pub mod connect;
pub mod http;
pub mod wire;

pub use api::{AgentApi, HealthApi, IndexedInstances};
pub use http::{HttpCatalog, HttpCatalogOptions, DEFAULT_CATALOG_ADDR};
