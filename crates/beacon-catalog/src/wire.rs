//! JSON payloads exchanged with the catalog agent.
//!
//! Field names follow the agent API's PascalCase convention. Response types
//! ignore unknown fields and default missing ones, so older or newer agents
//! decode without error.

use beacon_core::{HealthStatus, Instance, ProxyDefinition, Registration, ServiceKind};
use serde::{Deserialize, Serialize};

// ============================================================================
// Registration
// ============================================================================

/// Body of `PUT /v1/agent/service/register`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceRegistration {
    #[serde(skip_serializing_if = "ServiceKind::is_typical")]
    pub kind: ServiceKind,
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<AgentServiceCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<AgentServiceConnect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<AgentServiceProxy>,
}

/// TTL check embedded in a registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentServiceCheck {
    #[serde(rename = "CheckID")]
    pub check_id: String,
    #[serde(rename = "TTL")]
    pub ttl: String,
    #[serde(rename = "DeregisterCriticalServiceAfter")]
    pub deregister_critical_service_after: String,
}

/// Connect settings embedded in a registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceConnect {
    pub native: bool,
}

/// Proxy settings of a `connect-proxy` registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceProxy {
    pub destination_service_name: String,
    #[serde(rename = "DestinationServiceID", skip_serializing_if = "Option::is_none")]
    pub destination_service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_service_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_service_port: Option<u16>,
}

impl AgentServiceProxy {
    fn from_definition(proxy: &ProxyDefinition, fallback_address: Option<&str>) -> Self {
        Self {
            destination_service_name: proxy.destination_service_name.clone(),
            destination_service_id: proxy.destination_service_id.clone(),
            local_service_address: non_empty_or(&proxy.local_service_address, fallback_address),
            local_service_port: proxy.local_service_port,
        }
    }
}

fn non_empty_or(value: &Option<String>, fallback: Option<&str>) -> Option<String> {
    value
        .clone()
        .filter(|a| !a.is_empty())
        .or_else(|| fallback.map(str::to_string))
}

impl AgentServiceRegistration {
    /// Builds the wire payload, using `fallback_address` for the service
    /// address and the proxy's local service address when they are unset.
    pub fn from_registration(registration: &Registration, fallback_address: Option<&str>) -> Self {
        let address = non_empty_or(&registration.address, fallback_address);

        Self {
            kind: registration.kind,
            id: registration.service_id.as_str().to_string(),
            name: registration.name.clone(),
            tags: registration.tags.clone(),
            port: registration.port,
            address,
            check: Some(AgentServiceCheck {
                check_id: registration.check.check_id.as_str().to_string(),
                ttl: registration.ttl_string(),
                deregister_critical_service_after: registration.deregister_after_string(),
            }),
            connect: Some(AgentServiceConnect {
                native: registration.native,
            }),
            proxy: registration
                .proxy
                .as_ref()
                .map(|p| AgentServiceProxy::from_definition(p, fallback_address)),
        }
    }
}

/// Body of `PUT /v1/agent/check/update/{check_id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckUpdate<'a> {
    pub status: HealthStatus,
    pub output: &'a str,
}

// ============================================================================
// Health
// ============================================================================

/// One element of `GET /v1/health/connect/{service}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthServiceEntry {
    pub service: HealthService,
}

/// Service part of a health entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthService {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

impl From<HealthServiceEntry> for Instance {
    fn from(entry: HealthServiceEntry) -> Self {
        let HealthService {
            id,
            service,
            address,
            port,
        } = entry.service;
        Instance {
            id,
            service,
            address,
            port,
        }
    }
}
