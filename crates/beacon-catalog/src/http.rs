//! HTTP implementation of the catalog collaborator.
//!
//! Talks to a Consul-compatible agent over its HTTP API. Every request is
//! bounded by `request_timeout`; dropping a request future aborts it.
//!
//! # Blocking queries
//!
//! Health results carry the `X-Consul-Index` response header. The client
//! keeps no index of its own; callers pass back the index of their previous
//! result for the same service. When [`HttpCatalogOptions::blocking_wait`]
//! is set and that index is non-zero, the agent holds the request until the
//! result changes or the wait elapses. This only saves round trips: callers
//! diff full snapshots either way.
//!
//! The agent adds up to `wait / 16` of jitter, so `wait + wait / 16` must
//! stay below both `request_timeout` and the caller's own timeout.

use std::net::UdpSocket;
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::{
    format_seconds, CatalogError, CatalogResult, CheckId, HealthStatus, Instance, Registration,
    ServiceId,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::api::{AgentApi, HealthApi, IndexedInstances};
use crate::wire::{AgentServiceRegistration, CheckUpdate, HealthServiceEntry};

// ============================================================================
// Constants
// ============================================================================

/// Agent address used when none is configured.
pub const DEFAULT_CATALOG_ADDR: &str = "localhost:8500";

/// Default bound on a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response header carrying the catalog's change index.
const INDEX_HEADER: &str = "X-Consul-Index";

/// Request header carrying the ACL token.
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Well-known remote used only to pick the outbound interface; no packet is sent.
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:53";

// ============================================================================
// Options
// ============================================================================

/// Connection options for [`HttpCatalog`].
///
/// # Example
///
/// ```rust
/// use beacon_catalog::HttpCatalogOptions;
///
/// let options = HttpCatalogOptions {
///     address: "consul.internal:8500".to_string(),
///     ..Default::default()
/// };
/// assert!(options.blocking_wait.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct HttpCatalogOptions {
    /// Agent address, `host:port` or a full `http(s)://` base URL.
    pub address: String,

    /// Address advertised for registrations that do not name one.
    pub host_address: Option<String>,

    /// Detect `host_address` from the outbound interface when unset.
    pub detect_host_address: bool,

    /// Bound on each request.
    pub request_timeout: Duration,

    /// ACL token sent with every request.
    pub token: Option<String>,

    /// Enables blocking health queries with this wait.
    pub blocking_wait: Option<Duration>,
}

impl Default for HttpCatalogOptions {
    fn default() -> Self {
        Self {
            address: DEFAULT_CATALOG_ADDR.to_string(),
            host_address: None,
            detect_host_address: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            token: None,
            blocking_wait: None,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Catalog client over HTTP.
///
/// Implements [`AgentApi`] and [`HealthApi`]; share it behind an `Arc`.
#[derive(Debug)]
pub struct HttpCatalog {
    http: reqwest::Client,
    base_url: String,
    host_address: Option<String>,
    token: Option<String>,
    request_timeout: Duration,
    blocking_wait: Option<Duration>,
}

impl HttpCatalog {
    /// Creates a client from options.
    ///
    /// # Errors
    ///
    /// - `CatalogError::InvalidAddress` if the address is empty
    /// - `CatalogError::Transport` if the HTTP client cannot be built
    pub fn new(options: HttpCatalogOptions) -> CatalogResult<Self> {
        let base_url = base_url(&options.address)?;

        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let host_address = match options.host_address {
            Some(addr) => Some(addr),
            None if options.detect_host_address => detect_host_address(),
            None => None,
        };

        debug!(
            base_url = %base_url,
            host_address = ?host_address,
            blocking = options.blocking_wait.is_some(),
            "Catalog client created"
        );

        Ok(Self {
            http,
            base_url,
            host_address,
            token: options.token,
            request_timeout: options.request_timeout,
            blocking_wait: options.blocking_wait,
        })
    }

    /// Creates a client for the default local agent.
    pub fn with_defaults() -> CatalogResult<Self> {
        Self::new(HttpCatalogOptions::default())
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Address advertised for registrations that do not name one.
    pub fn host_address(&self) -> Option<&str> {
        self.host_address.as_deref()
    }

    /// Lists health entries of `service` from the connect health endpoint,
    /// with the change index of the result.
    ///
    /// `index` is sent only when blocking queries are enabled and it is
    /// non-zero.
    pub async fn health_connect(
        &self,
        service: &str,
        passing: bool,
        index: u64,
    ) -> CatalogResult<(Vec<HealthServiceEntry>, u64)> {
        let mut query = vec![("passing", passing.to_string())];
        if let Some(wait) = self.blocking_wait {
            if index > 0 {
                query.push(("index", index.to_string()));
                query.push(("wait", format_seconds(wait)));
            }
        }

        let request = self
            .request(Method::GET, &format!("/v1/health/connect/{service}"))
            .query(&query);
        let response = self.send("health_connect", request).await?;
        let response = ensure_success("health_connect", response)?;
        let index = response_index(&response);
        let entries = decode(response).await?;
        Ok((entries, index))
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        request
    }

    pub(crate) async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> CatalogResult<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout {
                    operation,
                    after: self.request_timeout,
                }
            } else {
                CatalogError::Transport(e.to_string())
            }
        })?;

        trace!(operation, status = response.status().as_u16(), "Catalog responded");
        Ok(response)
    }

}

#[async_trait]
impl AgentApi for HttpCatalog {
    async fn register_service(&self, registration: &Registration) -> CatalogResult<()> {
        let payload =
            AgentServiceRegistration::from_registration(registration, self.host_address());

        let request = self
            .request(Method::PUT, "/v1/agent/service/register")
            .json(&payload);
        let response = self.send("register_service", request).await?;
        let response = ensure_success("register_service", response)?;

        let body = response.text().await.unwrap_or_default();
        debug!(
            service_id = %registration.service_id,
            name = %registration.name,
            body = %body,
            "Service registered"
        );
        Ok(())
    }

    async fn deregister_service(&self, service_id: &ServiceId) -> CatalogResult<()> {
        let request = self.request(
            Method::PUT,
            &format!("/v1/agent/service/deregister/{service_id}"),
        );
        let response = self.send("deregister_service", request).await?;
        ensure_success("deregister_service", response)?;
        Ok(())
    }

    async fn update_ttl(
        &self,
        check_id: &CheckId,
        status: HealthStatus,
        output: &str,
    ) -> CatalogResult<()> {
        let body = CheckUpdate { status, output };
        let request = self
            .request(Method::PUT, &format!("/v1/agent/check/update/{check_id}"))
            .json(&body);
        let response = self.send("update_ttl", request).await?;

        // Anything but a plain 200 counts as a failed heartbeat.
        let code = response.status().as_u16();
        if code != 200 {
            return Err(CatalogError::Rejected {
                operation: "update_ttl",
                status: code,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HealthApi for HttpCatalog {
    async fn healthy_instances(
        &self,
        service: &str,
        passing_only: bool,
    ) -> CatalogResult<Vec<Instance>> {
        let result = self.healthy_instances_since(service, passing_only, 0).await?;
        Ok(result.instances)
    }

    async fn healthy_instances_since(
        &self,
        service: &str,
        passing_only: bool,
        index: u64,
    ) -> CatalogResult<IndexedInstances> {
        let (entries, index) = self.health_connect(service, passing_only, index).await?;
        Ok(IndexedInstances {
            instances: entries.into_iter().map(Instance::from).collect(),
            index,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Normalises an agent address into a base URL without trailing slash.
fn base_url(address: &str) -> CatalogResult<String> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() {
        return Err(CatalogError::InvalidAddress(
            "catalog address is empty".to_string(),
        ));
    }

    if address.starts_with("http://") || address.starts_with("https://") {
        Ok(address.to_string())
    } else {
        Ok(format!("http://{address}"))
    }
}

pub(crate) fn ensure_success(operation: &'static str, response: Response) -> CatalogResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(CatalogError::Rejected {
            operation,
            status: status.as_u16(),
        })
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> CatalogResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| CatalogError::Decode(e.to_string()))
}

/// Change index carried by a response, 0 if absent or malformed.
fn response_index(response: &Response) -> u64 {
    response
        .headers()
        .get(INDEX_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Returns the local address of the interface used for outbound traffic.
///
/// Connecting a UDP socket only selects a route; nothing is transmitted.
fn detect_host_address() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(ROUTE_PROBE_ADDR).ok()?;
    let local = socket.local_addr().ok()?;
    Some(local.ip().to_string())
}


// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::ProxyDefinition;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(server: &MockServer) -> HttpCatalogOptions {
        HttpCatalogOptions {
            address: server.uri(),
            host_address: Some("10.9.8.7".to_string()),
            detect_host_address: false,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn blocking(server: &MockServer, wait_secs: u64) -> HttpCatalog {
        HttpCatalog::new(HttpCatalogOptions {
            blocking_wait: Some(Duration::from_secs(wait_secs)),
            ..options(server)
        })
        .unwrap()
    }

    fn registration() -> Registration {
        Registration::new(
            ServiceId::new("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            CheckId::new("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
            "api",
            8090,
            Duration::from_secs(3),
        )
    }

    /// Query strings of every request the server received, in order.
    async fn queries(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| format!("{}?{}", r.url.path(), r.url.query().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_base_url_adds_scheme() {
        assert_eq!(base_url("localhost:8500").unwrap(), "http://localhost:8500");
        assert_eq!(base_url("https://c.example/").unwrap(), "https://c.example");
    }

    #[test]
    fn test_empty_address_rejected() {
        let result = HttpCatalog::new(HttpCatalogOptions {
            address: "  ".to_string(),
            detect_host_address: false,
            ..Default::default()
        });
        assert!(matches!(result, Err(CatalogError::InvalidAddress(_))));
    }

    // ------------------------------------------------------------------------
    // Agent endpoints
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_register_sends_payload() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/agent/service/register"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        catalog.register_service(&registration()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["ID"], "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(body["Address"], "10.9.8.7");
        assert_eq!(body["Check"]["TTL"], "9s");
        assert_eq!(body["Check"]["DeregisterCriticalServiceAfter"], "15s");
    }

    #[tokio::test]
    async fn test_register_proxy_fills_local_address() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/agent/service/register"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        let proxy = ProxyDefinition {
            local_service_port: Some(5432),
            ..ProxyDefinition::new("db")
        };
        catalog
            .register_service(&registration().with_proxy(Some(proxy)))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["Kind"], "connect-proxy");
        assert_eq!(body["Proxy"]["DestinationServiceName"], "db");
        assert_eq!(body["Proxy"]["LocalServiceAddress"], "10.9.8.7");
        assert_eq!(body["Proxy"]["LocalServicePort"], 5432);
    }

    #[tokio::test]
    async fn test_register_rejected_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        let result = catalog.register_service(&registration()).await;
        assert_eq!(
            result,
            Err(CatalogError::Rejected {
                operation: "register_service",
                status: 400
            })
        );
    }

    #[tokio::test]
    async fn test_deregister_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/agent/service/deregister/abc123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        catalog
            .deregister_service(&ServiceId::new("abc123"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_ttl_success() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/agent/check/update/c1"))
            .and(body_json(serde_json::json!({"Status": "passing", "Output": "ok"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        catalog
            .update_ttl(&CheckId::new("c1"), HealthStatus::Pass, "ok")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_ttl_non_200_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        let result = catalog
            .update_ttl(&CheckId::new("c1"), HealthStatus::Fail, "disk full")
            .await;
        assert_eq!(
            result,
            Err(CatalogError::Rejected {
                operation: "update_ttl",
                status: 500
            })
        );
    }

    #[tokio::test]
    async fn test_update_ttl_other_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        let result = catalog
            .update_ttl(&CheckId::new("c1"), HealthStatus::Pass, "ok")
            .await;
        assert!(matches!(result, Err(CatalogError::Rejected { status: 204, .. })));
    }

    // ------------------------------------------------------------------------
    // Health queries
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_healthy_instances_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health/connect/api"))
            .and(query_param("passing", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"Service": {"ID": "b2", "Service": "api", "Address": "h2", "Port": 2}},
                {"Service": {"ID": "a1", "Service": "api", "Address": "h1", "Port": 1}}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        let instances = catalog.healthy_instances("api", true).await.unwrap();
        assert_eq!(
            instances,
            vec![
                Instance::new("b2", "api", "h2", 2),
                Instance::new("a1", "api", "h1", 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        let result = catalog.healthy_instances("api", true).await;
        assert!(matches!(result, Err(CatalogError::Decode(_))));
    }

    #[tokio::test]
    async fn test_index_reported_and_sent_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health/connect/api"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .insert_header("X-Consul-Index", "42"),
            )
            .mount(&server)
            .await;
        let catalog = blocking(&server, 5);

        let first = catalog.healthy_instances_since("api", true, 0).await.unwrap();
        assert_eq!(first.index, 42);
        catalog
            .healthy_instances_since("api", true, first.index)
            .await
            .unwrap();

        assert_eq!(
            queries(&server).await,
            vec![
                "/v1/health/connect/api?passing=true",
                "/v1/health/connect/api?passing=true&index=42&wait=5s",
            ]
        );
    }

    #[tokio::test]
    async fn test_index_not_shared_between_services() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health/connect/api"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .insert_header("X-Consul-Index", "42"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/health/connect/ledger"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        let catalog = blocking(&server, 20);

        let api = catalog.healthy_instances_since("api", true, 0).await.unwrap();
        assert_eq!(api.index, 42);
        let ledger = catalog.healthy_instances_since("ledger", true, 0).await.unwrap();
        assert_eq!(ledger.index, 0);
        catalog.healthy_instances("api", true).await.unwrap();

        assert_eq!(
            queries(&server).await,
            vec![
                "/v1/health/connect/api?passing=true",
                "/v1/health/connect/ledger?passing=true",
                "/v1/health/connect/api?passing=true",
            ]
        );
    }

    #[tokio::test]
    async fn test_index_not_sent_without_blocking_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(options(&server)).unwrap();

        catalog.healthy_instances_since("api", true, 42).await.unwrap();

        assert_eq!(
            queries(&server).await,
            vec!["/v1/health/connect/api?passing=true"]
        );
    }

    #[tokio::test]
    async fn test_token_header_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-Consul-Token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;
        let catalog = HttpCatalog::new(HttpCatalogOptions {
            token: Some("secret".to_string()),
            ..options(&server)
        })
        .unwrap();

        catalog.healthy_instances("api", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Reserve a port, then free it so nothing listens there.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let catalog = HttpCatalog::new(HttpCatalogOptions {
            address: addr,
            detect_host_address: false,
            ..Default::default()
        })
        .unwrap();
        let result = catalog.healthy_instances("api", true).await;
        assert!(matches!(result, Err(CatalogError::Transport(_))));
    }
}
