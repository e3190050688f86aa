//! Error types shared by the catalog client and the control loops.
//!
//! - [`CatalogError`] - failures talking to the catalog.
//! - [`ProbeError`] - a caller-supplied health probe reporting unhealthy.
//!
//! Cancellation is not a catalog error; the loops report it separately.

use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Catalog Errors
// ============================================================================

/// Errors returned by catalog operations.
///
/// None of these are fatal to the hosting process: the registration
/// supervisor and the watcher retry on all of them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Network or backend failure before a response was received.
    #[error("catalog transport error: {0}")]
    Transport(String),

    /// The catalog answered with a non-success status.
    #[error("catalog rejected {operation}: HTTP {status}")]
    Rejected {
        /// Operation that was rejected (e.g. `update_ttl`).
        operation: &'static str,
        /// HTTP status code returned by the catalog.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("failed to decode catalog response: {0}")]
    Decode(String),

    /// The operation did not complete in time.
    #[error("catalog {operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// The configured catalog address is unusable.
    #[error("invalid catalog address: {0}")]
    InvalidAddress(String),
}

impl CatalogError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CatalogError::Transport(_) => "catalog_transport",
            CatalogError::Rejected { .. } => "catalog_rejected",
            CatalogError::Decode(_) => "catalog_decode",
            CatalogError::Timeout { .. } => "catalog_timeout",
            CatalogError::InvalidAddress(_) => "catalog_invalid_address",
        }
    }

    /// Indicates whether retrying the operation can succeed.
    ///
    /// Only a malformed address is permanent.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CatalogError::InvalidAddress(_))
    }
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

// ============================================================================
// Probe Errors
// ============================================================================

/// Failure reported by a health probe.
///
/// Not a system error: the heartbeat loop turns it into a failing status
/// with this message as output and keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProbeError {
    message: String,
}

impl ProbeError {
    /// Creates a probe error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message reported as check output.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let error = CatalogError::Rejected {
            operation: "update_ttl",
            status: 500,
        };
        let display = format!("{error}");
        assert!(display.contains("update_ttl"));
        assert!(display.contains("500"));
    }

    #[test]
    fn test_timeout_display() {
        let error = CatalogError::Timeout {
            operation: "health_connect",
            after: Duration::from_secs(30),
        };
        assert!(format!("{error}").contains("30s"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            CatalogError::Transport("refused".into()).as_label(),
            "catalog_transport"
        );
        assert_eq!(
            CatalogError::Decode("eof".into()).as_label(),
            "catalog_decode"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(CatalogError::Transport("x".into()).is_retryable());
        assert!(CatalogError::Rejected {
            operation: "register",
            status: 503
        }
        .is_retryable());
        assert!(!CatalogError::InvalidAddress("::".into()).is_retryable());
    }

    #[test]
    fn test_probe_error_display_is_message() {
        let error = ProbeError::new("disk full");
        assert_eq!(error.to_string(), "disk full");
        assert_eq!(error.message(), "disk full");
    }
}
