//! Caller identity resolution.
//!
//! Callers are identified by a device correlation cookie set by the client.
//! Callers without one share a single anonymous bucket.

use axum::http::{header::COOKIE, HeaderMap};
use std::sync::Arc;

/// Key used for every caller without a device id.
pub const ANONYMOUS: &str = "anon";

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A client-supplied device correlation id, used verbatim.
    Device(String),
    /// No usable device id was supplied.
    Anonymous,
}

impl Identity {
    /// The counter key for this identity.
    pub fn as_key(&self) -> &str {
        match self {
            Identity::Device(id) => id,
            Identity::Anonymous => ANONYMOUS,
        }
    }

    /// Build an identity from an optional raw value.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(id) if !id.is_empty() => Identity::Device(id.to_string()),
            _ => Identity::Anonymous,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Resolves an [`Identity`] from request headers.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    cookie_name: Arc<str>,
}

impl IdentityResolver {
    pub fn new(cookie_name: &str) -> Self {
        Self {
            cookie_name: Arc::from(cookie_name),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Resolve the caller. Never fails.
    pub fn resolve(&self, headers: &HeaderMap) -> Identity {
        Identity::from_value(self.find_cookie(headers))
    }

    /// First value of the configured cookie across all `Cookie` headers.
    fn find_cookie<'h>(&self, headers: &'h HeaderMap) -> Option<&'h str> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|cookie| cookie.trim().split_once('='))
            .find(|(name, _)| *name == &*self.cookie_name)
            .map(|(_, value)| value)
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new("deviceId")
    }
}
