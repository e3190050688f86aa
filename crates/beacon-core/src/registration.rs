//! Service registration with an attached TTL health check.
//!
//! The check's TTL is three heartbeat intervals and the catalog prunes the
//! service after five: one missed heartbeat is tolerated, three trip the
//! check to failing, five remove the registration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::{CheckId, ServiceId};

/// Heartbeat intervals before the TTL check turns critical.
pub const TTL_MULTIPLIER: u32 = 3;

/// Heartbeat intervals before the catalog deregisters a critical service.
pub const DEREGISTER_MULTIPLIER: u32 = 5;

/// Formats a duration as a whole number of seconds, e.g. `"9s"`.
///
/// Sub-second remainders are truncated.
pub fn format_seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

fn scaled(interval: Duration, factor: u32) -> Duration {
    interval.checked_mul(factor).unwrap_or(Duration::MAX)
}

/// Kind of service being registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    /// A typical service. Omitted on the wire.
    #[default]
    #[serde(rename = "")]
    Typical,
    /// A proxy speaking the connect protocol on behalf of another service.
    #[serde(rename = "connect-proxy")]
    ConnectProxy,
}

impl ServiceKind {
    /// Returns `true` for the kind that is left out of the wire payload.
    pub fn is_typical(&self) -> bool {
        matches!(self, ServiceKind::Typical)
    }
}

/// Destination of a connect proxy registration.
///
/// An unset `local_service_address` is filled with the client's host
/// address when the registration is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyDefinition {
    /// Name of the service the proxy fronts.
    pub destination_service_name: String,
    /// Registration ID of a specific destination instance.
    pub destination_service_id: Option<String>,
    /// Address the destination listens on locally.
    pub local_service_address: Option<String>,
    /// Port the destination listens on locally.
    pub local_service_port: Option<u16>,
}

impl ProxyDefinition {
    pub fn new(destination_service_name: impl Into<String>) -> Self {
        Self {
            destination_service_name: destination_service_name.into(),
            ..Self::default()
        }
    }
}

/// TTL check attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDefinition {
    pub check_id: CheckId,
    /// Time without a heartbeat before the check turns critical.
    pub ttl: Duration,
    /// Time critical before the catalog removes the service.
    pub deregister_after: Duration,
}

/// One registration attempt's view of the service.
///
/// Built fresh for every session; identifiers are never reused across
/// attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub kind: ServiceKind,
    pub service_id: ServiceId,
    pub name: String,
    pub tags: Vec<String>,
    pub port: u16,
    /// Advertised address. `None` lets the catalog client fill in the host address.
    pub address: Option<String>,
    pub check: CheckDefinition,
    /// Whether the service speaks the connect protocol natively.
    pub native: bool,
    /// Proxy settings; present only for [`ServiceKind::ConnectProxy`].
    pub proxy: Option<ProxyDefinition>,
}

impl Registration {
    /// Creates a typical, natively-connected registration whose check
    /// timings derive from the heartbeat `interval`.
    pub fn new(
        service_id: ServiceId,
        check_id: CheckId,
        name: impl Into<String>,
        port: u16,
        interval: Duration,
    ) -> Self {
        Self {
            kind: ServiceKind::Typical,
            service_id,
            name: name.into(),
            tags: Vec::new(),
            port,
            address: None,
            check: CheckDefinition {
                check_id,
                ttl: scaled(interval, TTL_MULTIPLIER),
                deregister_after: scaled(interval, DEREGISTER_MULTIPLIER),
            },
            native: true,
            proxy: None,
        }
    }

    /// Sets the advertised address.
    #[must_use]
    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    /// Sets the registration tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Turns the registration into a connect proxy for `proxy`'s destination.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<ProxyDefinition>) -> Self {
        self.kind = if proxy.is_some() {
            ServiceKind::ConnectProxy
        } else {
            ServiceKind::Typical
        };
        self.proxy = proxy;
        self
    }

    /// Check TTL as a whole-seconds string.
    pub fn ttl_string(&self) -> String {
        format_seconds(self.check.ttl)
    }

    /// Deregister-after bound as a whole-seconds string.
    pub fn deregister_after_string(&self) -> String {
        format_seconds(self.check.deregister_after)
    }
}
