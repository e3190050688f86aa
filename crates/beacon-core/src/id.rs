//! Registration identifiers and their generator.
//!
//! Every registration attempt gets a fresh service ID and check ID. An ID is
//! 128 bits of randomness rendered as 32 lowercase hex characters.
//!
//! The generator is an owned value rather than process-global state, so a
//! supervisor can hold one and tests can seed it deterministically.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Length of a rendered identifier.
pub const ID_HEX_LEN: usize = 32;

// ============================================================================
// Identifier newtypes
// ============================================================================

/// Identifier of one service registration in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the TTL check attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckId(String);

impl CheckId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Source of fresh registration identifiers.
///
/// Owned by whoever drives registration attempts and passed by `&mut` into
/// each attempt.
///
/// # Example
///
/// ```
/// use beacon_core::IdGenerator;
///
/// let mut ids = IdGenerator::seeded(7);
/// let service_id = ids.service_id();
/// assert_eq!(service_id.as_str().len(), 32);
/// ```
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: StdRng,
}

impl IdGenerator {
    /// Creates a generator seeded from operating system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a generator with a fixed seed. Same seed, same sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns 128 random bits as 32 lowercase hex characters.
    pub fn next_hex(&mut self) -> String {
        let bits: u128 = self.rng.gen();
        format!("{bits:032x}")
    }

    /// Returns a fresh service identifier.
    pub fn service_id(&mut self) -> ServiceId {
        ServiceId(self.next_hex())
    }

    /// Returns a fresh check identifier.
    pub fn check_id(&mut self) -> CheckId {
        CheckId(self.next_hex())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_lower_hex(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    #[test]
    fn test_hex_format() {
        let mut ids = IdGenerator::from_entropy();
        for _ in 0..64 {
            let id = ids.next_hex();
            assert_eq!(id.len(), ID_HEX_LEN);
            assert!(is_lower_hex(&id), "not lowercase hex: {id}");
        }
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let mut a = IdGenerator::seeded(42);
        let mut b = IdGenerator::seeded(42);
        assert_eq!(a.service_id(), b.service_id());
        assert_eq!(a.check_id(), b.check_id());
    }

    #[test]
    fn test_consecutive_ids_differ() {
        let mut ids = IdGenerator::seeded(1);
        let service_id = ids.service_id();
        let check_id = ids.check_id();
        let next_service_id = ids.service_id();
        assert_ne!(service_id.as_str(), check_id.as_str());
        assert_ne!(service_id, next_service_id);
    }

    #[test]
    fn test_leading_zeros_are_kept() {
        // Padding must hold for small values too.
        assert_eq!(format!("{:032x}", 1u128).len(), ID_HEX_LEN);
    }

    #[test]
    fn test_display_matches_as_str() {
        let id = ServiceId::new("abc");
        assert_eq!(id.to_string(), "abc");
        assert_eq!(CheckId::new("def").to_string(), "def");
    }
}
