//! Catalog capabilities consumed by the control loops.
//!
//! Implementations must make their futures safe to drop: the loops cancel
//! an in-flight call by dropping it when shutdown is requested.

use async_trait::async_trait;
use beacon_core::{CatalogResult, CheckId, HealthStatus, Instance, Registration, ServiceId};

/// Agent-side operations: service registration and TTL heartbeats.
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Registers a service together with its TTL check.
    ///
    /// Each call carries fresh identifiers, so repeating it after a failure
    /// never collides with an earlier attempt.
    async fn register_service(&self, registration: &Registration) -> CatalogResult<()>;

    /// Removes a service registration.
    async fn deregister_service(&self, service_id: &ServiceId) -> CatalogResult<()>;

    /// Asserts the state of a TTL check.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Rejected` when the catalog does not
    /// acknowledge the update with a success status.
    async fn update_ttl(
        &self,
        check_id: &CheckId,
        status: HealthStatus,
        output: &str,
    ) -> CatalogResult<()>;
}

/// A health query result with the catalog's change index for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedInstances {
    pub instances: Vec<Instance>,
    /// Change index reported with the result; 0 when unknown.
    pub index: u64,
}

/// Health queries.
#[async_trait]
pub trait HealthApi: Send + Sync {
    /// Lists instances of `service`; with `passing_only`, only those whose
    /// checks all pass.
    ///
    /// Order is unspecified. Instance IDs must be unique within one result.
    async fn healthy_instances(
        &self,
        service: &str,
        passing_only: bool,
    ) -> CatalogResult<Vec<Instance>>;

    /// Like [`healthy_instances`](Self::healthy_instances), but may hold the
    /// query until the result changes past `index`.
    ///
    /// The caller owns `index`: pass 0 on a first query, then the index of
    /// the previous result for the same service. Implementations without
    /// blocking support ignore it and report index 0.
    async fn healthy_instances_since(
        &self,
        service: &str,
        passing_only: bool,
        index: u64,
    ) -> CatalogResult<IndexedInstances> {
        let _ = index;
        let instances = self.healthy_instances(service, passing_only).await?;
        Ok(IndexedInstances {
            instances,
            index: 0,
        })
    }
}
