//! Health state reported through a TTL check.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Output text reported alongside a passing heartbeat.
pub const PASS_OUTPUT: &str = "ok";

/// Status asserted by a heartbeat.
///
/// Serialises to the catalog's wire names (`passing`, `warning`, `critical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[serde(rename = "passing")]
    Pass,
    #[serde(rename = "warning")]
    Warn,
    #[serde(rename = "critical")]
    Fail,
}

impl HealthStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Pass => "passing",
            HealthStatus::Warn => "warning",
            HealthStatus::Fail => "critical",
        }
    }

    /// Converts a probe outcome into the status and output text to report.
    ///
    /// A passing probe reports `Pass` with output `"ok"`; a failing probe
    /// reports `Fail` with the probe's message as output.
    ///
    /// ```
    /// use beacon_core::{HealthStatus, ProbeError};
    ///
    /// let (status, output) = HealthStatus::from_probe(Err(ProbeError::new("disk full")));
    /// assert_eq!(status, HealthStatus::Fail);
    /// assert_eq!(output, "disk full");
    /// ```
    pub fn from_probe(outcome: Result<(), ProbeError>) -> (Self, String) {
        match outcome {
            Ok(()) => (HealthStatus::Pass, PASS_OUTPUT.to_string()),
            Err(e) => (HealthStatus::Fail, e.message().to_string()),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(HealthStatus::Pass.as_str(), "passing");
        assert_eq!(HealthStatus::Warn.as_str(), "warning");
        assert_eq!(HealthStatus::Fail.as_str(), "critical");
    }

    #[test]
    fn test_serde_matches_as_str() {
        for status in [HealthStatus::Pass, HealthStatus::Warn, HealthStatus::Fail] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_from_probe_ok() {
        let (status, output) = HealthStatus::from_probe(Ok(()));
        assert_eq!(status, HealthStatus::Pass);
        assert_eq!(output, "ok");
    }

    #[test]
    fn test_from_probe_err() {
        let (status, output) = HealthStatus::from_probe(Err(ProbeError::new("disk full")));
        assert_eq!(status, HealthStatus::Fail);
        assert_eq!(output, "disk full");
    }
}
