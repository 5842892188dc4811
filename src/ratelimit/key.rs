//! Partition key resolution.

use std::borrow::Borrow;
use std::fmt;

/// Key of the single partition used by the global limiter.
pub const GLOBAL_PARTITION: &str = "global";

/// A key that uniquely identifies a rate limit partition within a limiter class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Create a partition key from any string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The fixed key of the global partition.
    pub fn global() -> Self {
        Self::new(GLOBAL_PARTITION)
    }

    /// Resolve the per-identity key for a request.
    ///
    /// Returns the identity claim when it is present and non-empty, and the
    /// transport-level host otherwise.
    pub fn resolve(identity_claim: Option<&str>, fallback_host: &str) -> Self {
        match identity_claim {
            Some(claim) if !claim.is_empty() => Self::new(claim),
            _ => Self::new(fallback_host),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PartitionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PartitionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PartitionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_wins_over_host() {
        for host in ["api.example.com", "", "localhost:8080"] {
            let key = PartitionKey::resolve(Some("user-42"), host);
            assert_eq!(key.as_str(), "user-42");
        }
    }

    #[test]
    fn test_missing_claim_falls_back_to_host() {
        let key = PartitionKey::resolve(None, "api.example.com");
        assert_eq!(key.as_str(), "api.example.com");
    }

    #[test]
    fn test_empty_claim_falls_back_to_host() {
        let key = PartitionKey::resolve(Some(""), "api.example.com");
        assert_eq!(key.as_str(), "api.example.com");
    }

    #[test]
    fn test_whitespace_claim_is_not_empty() {
        let key = PartitionKey::resolve(Some(" "), "api.example.com");
        assert_eq!(key.as_str(), " ");
    }

    #[test]
    fn test_global_key() {
        assert_eq!(PartitionKey::global().to_string(), GLOBAL_PARTITION);
    }
}
