//! Counter key generation and handling.

use serde::{Deserialize, Serialize};

/// A key that uniquely identifies one rate limit counter.
///
/// The key is composed of the protected operation and the caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateKey {
    /// The protected operation, e.g. `exercises:bodyParts`
    pub operation: String,
    /// The caller, e.g. a device id or `anon`
    pub identity: String,
}

impl RateKey {
    /// Create a new rate key from an operation and an identity.
    pub fn new(operation: &str, identity: &str) -> Self {
        Self {
            operation: operation.to_string(),
            identity: identity.to_string(),
        }
    }

    /// Convert the key to a flat string suitable for an external store.
    ///
    /// `|` is used as the delimiter since operations already use `:`.
    pub fn to_string_key(&self) -> String {
        format!("{}|{}", self.operation, self.identity)
    }
}

impl std::fmt::Display for RateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}
