//! Session claim types and their validation rules.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Validation errors raised while issuing a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionValidationError {
    #[error("session user id must not be blank")]
    BlankUserId,
    #[error("session token must not be blank")]
    BlankToken,
    #[error("session role must not be blank")]
    BlankRole,
    #[error("session expiry {expires_at} must be after issuance {issued_at}")]
    ExpiryNotAfterIssuance {
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    #[error("failed to sign session: {message}")]
    Signing { message: String },
}

/// Identity facts carried inside a session.
///
/// ## Invariants
/// - `user_id`, `token` and `role` are non-blank.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionClaims {
    user_id: String,
    token: String,
    role: String,
}

impl SessionClaims {
    /// Validate and build session claims.
    ///
    /// # Examples
    /// ```
    /// use gateway::domain::session::{SessionClaims, SessionValidationError};
    ///
    /// let claims = SessionClaims::new("u-1", "backend-token", "admin").expect("claims");
    /// assert_eq!(claims.role(), "admin");
    ///
    /// let blank = SessionClaims::new("u-1", "  ", "admin");
    /// assert_eq!(blank, Err(SessionValidationError::BlankToken));
    /// ```
    pub fn new(
        user_id: impl Into<String>,
        token: impl Into<String>,
        role: impl Into<String>,
    ) -> Result<Self, SessionValidationError> {
        let user_id = user_id.into();
        let token = token.into();
        let role = role.into();
        if user_id.trim().is_empty() {
            return Err(SessionValidationError::BlankUserId);
        }
        if token.trim().is_empty() {
            return Err(SessionValidationError::BlankToken);
        }
        if role.trim().is_empty() {
            return Err(SessionValidationError::BlankRole);
        }
        Ok(Self {
            user_id,
            token,
            role,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Upstream bearer credential.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> &str {
        &self.role
    }
}

impl fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClaims")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Verified session contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPayload {
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

/// Opaque signed session string with its issuance and expiry instants
/// (whole seconds).
#[derive(Clone, PartialEq, Eq)]
pub struct SignedSession {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for SignedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedSession")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
