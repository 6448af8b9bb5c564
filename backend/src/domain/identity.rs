//! Caller identity used to bucket rate-limiting decisions.

use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of the identity fingerprint in bytes before hex encoding.
const FINGERPRINT_BYTES: usize = 8;

/// Opaque per-caller key: a user id or a bearer credential.
///
/// ## Invariants
/// - The raw value is non-empty once trimmed.
/// - `Debug` and `Display` only ever show the fingerprint, so bearer
///   credentials never reach logs.
///
/// # Examples
/// ```
/// use gateway::domain::Identity;
///
/// let identity = Identity::new("user-42").expect("non-empty identity");
/// assert_eq!(identity.as_str(), "user-42");
/// assert_eq!(identity.fingerprint().len(), 16);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

/// Validation errors returned when constructing [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityValidationError {
    /// The identity is empty after trimming whitespace.
    #[error("identity must not be empty")]
    Empty,
}

impl Identity {
    /// Validate and wrap a raw identity string.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentityValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(IdentityValidationError::Empty);
        }
        Ok(Self(raw))
    }

    /// Borrow the raw identity.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Truncated SHA-256 fingerprint, safe to log.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identity").field(&self.fingerprint()).finish()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}
