//! Healthy instances reported by the catalog, and the update events
//! derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One healthy endpoint of a service, as reported by the catalog.
///
/// `id` is the identity key: unique per registration, and the only field
/// compared when diffing snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Registration ID of the instance (identity key).
    pub id: String,
    /// Name of the service the instance belongs to.
    pub service: String,
    /// Address the instance is reachable on.
    pub address: String,
    /// Port the instance listens on.
    pub port: u16,
}

impl Instance {
    /// Creates an instance.
    pub fn new(
        id: impl Into<String>,
        service: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            address: address.into(),
            port,
        }
    }

    /// Returns the `host:port` endpoint of this instance.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Kind of change to the set of healthy endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// The endpoint became available.
    Add,
    /// The endpoint went away.
    Remove,
}

/// A single change for the load-balancing layer to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub kind: UpdateKind,
    /// `host:port` of the affected endpoint.
    pub endpoint: String,
}

impl Update {
    /// An `Add` update for the given instance.
    pub fn add(instance: &Instance) -> Self {
        Self {
            kind: UpdateKind::Add,
            endpoint: instance.endpoint(),
        }
    }

    /// A `Remove` update for the given instance.
    pub fn remove(instance: &Instance) -> Self {
        Self {
            kind: UpdateKind::Remove,
            endpoint: instance.endpoint(),
        }
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            UpdateKind::Add => write!(f, "+{}", self.endpoint),
            UpdateKind::Remove => write!(f, "-{}", self.endpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_format() {
        let instance = Instance::new("a1", "api", "10.0.0.7", 8080);
        assert_eq!(instance.endpoint(), "10.0.0.7:8080");
    }

    #[test]
    fn test_update_constructors() {
        let instance = Instance::new("a1", "api", "h1", 1);
        assert_eq!(
            Update::add(&instance),
            Update {
                kind: UpdateKind::Add,
                endpoint: "h1:1".to_string()
            }
        );
        assert_eq!(Update::remove(&instance).kind, UpdateKind::Remove);
    }

    #[test]
    fn test_update_display() {
        let instance = Instance::new("a1", "api", "h1", 1);
        assert_eq!(Update::add(&instance).to_string(), "+h1:1");
        assert_eq!(Update::remove(&instance).to_string(), "-h1:1");
    }
}
