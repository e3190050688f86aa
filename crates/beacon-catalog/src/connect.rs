//! Connect read endpoints: intention authorization and CA material.
//!
//! The agent makes the decisions and issues the certificates; these calls
//! only fetch the results for a natively-connected service.

use beacon_core::CatalogResult;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::http::{decode, ensure_success, HttpCatalog};

/// Body of `POST /v1/agent/connect/authorize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizeRequest {
    /// Name of the destination service.
    pub target: String,
    /// URI SAN of the client certificate.
    #[serde(rename = "ClientCertURI")]
    pub client_cert_uri: String,
    pub client_cert_serial: String,
}

/// Authorization verdict.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizeResponse {
    pub authorized: bool,
    #[serde(default)]
    pub reason: String,
}

/// Leaf certificate issued to a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaLeaf {
    pub serial_number: String,
    #[serde(rename = "CertPEM")]
    pub cert_pem: String,
    #[serde(rename = "PrivateKeyPEM")]
    pub private_key_pem: String,
    pub service: String,
    #[serde(rename = "ServiceURI")]
    pub service_uri: String,
    pub valid_after: DateTime<Utc>,
    pub valid_before: DateTime<Utc>,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
}

impl CaLeaf {
    /// Returns `true` if `now` falls inside the certificate's validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_after <= now && now < self.valid_before
    }
}

/// One CA root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaRoot {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub serial_number: u64,
    #[serde(rename = "SigningKeyID", default)]
    pub signing_key_id: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub root_cert: String,
    #[serde(default)]
    pub intermediate_certs: Vec<String>,
    pub active: bool,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
}

/// The set of trusted CA roots.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaRoots {
    #[serde(rename = "ActiveRootID")]
    pub active_root_id: String,
    pub trust_domain: String,
    #[serde(default)]
    pub roots: Vec<CaRoot>,
}

impl CaRoots {
    /// Returns the currently active root, if listed.
    pub fn active_root(&self) -> Option<&CaRoot> {
        self.roots.iter().find(|r| r.id == self.active_root_id)
    }
}

impl HttpCatalog {
    /// Asks the agent whether a client certificate may connect to `target`.
    pub async fn connect_authorize(
        &self,
        input: &AuthorizeRequest,
    ) -> CatalogResult<AuthorizeResponse> {
        let request = self
            .request(Method::POST, "/v1/agent/connect/authorize")
            .json(input);
        let response = self.send("connect_authorize", request).await?;
        decode(ensure_success("connect_authorize", response)?).await
    }

    /// Fetches the leaf certificate for `service`.
    pub async fn connect_ca_leaf(&self, service: &str) -> CatalogResult<CaLeaf> {
        let request = self.request(Method::GET, &format!("/v1/agent/connect/ca/leaf/{service}"));
        let response = self.send("connect_ca_leaf", request).await?;
        decode(ensure_success("connect_ca_leaf", response)?).await
    }

    /// Fetches the trusted CA roots.
    pub async fn connect_ca_roots(&self) -> CatalogResult<CaRoots> {
        let request = self.request(Method::GET, "/v1/agent/connect/ca/roots");
        let response = self.send("connect_ca_roots", request).await?;
        decode(ensure_success("connect_ca_roots", response)?).await
    }
}
