//! Caller identity keys.

use std::fmt;

use crate::error::{Result, TurnstileError};

/// Opaque, non-empty key identifying a caller for per-identity quotas.
///
/// Identities are resolved by the caller-facing layer; this type only
/// guarantees the key is usable. An empty key would collapse every
/// anonymous caller into one shared quota, so it is refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Validate and wrap a caller identity.
    pub fn new(identity: &str) -> Result<Self> {
        if identity.trim().is_empty() {
            return Err(TurnstileError::InvalidIdentity);
        }
        Ok(Self(identity.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
