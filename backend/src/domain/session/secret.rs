//! Session signing secret.

use std::fmt;

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

/// Minimum accepted secret length in bytes.
pub const SESSION_SECRET_MIN_LEN: usize = 32;
const FINGERPRINT_BYTES: usize = 8;

/// Errors raised when wrapping secret material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionSecretError {
    #[error("session secret too short: need >= {min_len} bytes, got {length}")]
    TooShort { length: usize, min_len: usize },
}

/// HMAC key material, zeroised on drop.
///
/// `Debug` only shows the fingerprint.
#[derive(Clone)]
pub struct SessionSecret(Zeroizing<Vec<u8>>);

impl SessionSecret {
    /// Wrap raw key bytes, rejecting anything shorter than
    /// [`SESSION_SECRET_MIN_LEN`].
    ///
    /// # Examples
    /// ```
    /// use gateway::domain::session::SessionSecret;
    ///
    /// assert!(SessionSecret::from_bytes(vec![7; 32]).is_ok());
    /// assert!(SessionSecret::from_bytes(b"short".to_vec()).is_err());
    /// ```
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SessionSecretError> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() < SESSION_SECRET_MIN_LEN {
            return Err(SessionSecretError::TooShort {
                length: bytes.len(),
                min_len: SESSION_SECRET_MIN_LEN,
            });
        }
        Ok(Self(bytes))
    }

    /// Random 64-byte secret for development runs.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new(vec![0_u8; 64]);
        rand::thread_rng().fill_bytes(bytes.as_mut_slice());
        Self(bytes)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Truncated SHA-256 fingerprint: the first 8 bytes as 16 hex
    /// characters. Identifies the active secret in logs without exposing it.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.expose());
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionSecret")
            .field(&self.fingerprint())
            .finish()
    }
}
