//! HS256 session token issuance and verification.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::claims::{SessionClaims, SessionPayload, SessionValidationError, SignedSession};
use super::secret::SessionSecret;

/// Session lifetime applied when the caller supplies no explicit expiry.
pub const DEFAULT_SESSION_TTL: TimeDelta = TimeDelta::days(7);

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    token: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies session tokens with one secret.
///
/// Timestamps are whole seconds. Expiry is checked against the injected
/// clock with zero leeway: a token is valid strictly before `exp`.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use gateway::domain::session::{SessionClaims, SessionCodec, SessionSecret};
///
/// let codec = SessionCodec::new(&SessionSecret::generate(), Arc::new(mockable::DefaultClock));
/// let claims = SessionClaims::new("u-1", "backend-token", "member").expect("claims");
/// let signed = codec.encrypt(&claims, None).expect("signed session");
///
/// let payload = codec.decrypt(&signed.token).expect("valid session");
/// assert_eq!(payload.claims, claims);
/// assert!(codec.decrypt("not-a-session").is_none());
/// ```
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl SessionCodec {
    /// Derive signing keys from `secret`.
    pub fn new(secret: &SessionSecret, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.expose()),
            decoding: DecodingKey::from_secret(secret.expose()),
            validation,
            clock,
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Override the default session lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    /// Configured default lifetime.
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Sign `claims`, expiring at `expires_at` or after the default TTL.
    ///
    /// # Errors
    ///
    /// Returns [`SessionValidationError::ExpiryNotAfterIssuance`] when the
    /// expiry (truncated to whole seconds) is not after the issuance second.
    pub fn encrypt(
        &self,
        claims: &SessionClaims,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<SignedSession, SessionValidationError> {
        let now = self.now();
        let requested = expires_at
            .or_else(|| now.checked_add_signed(self.ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let iat = now.timestamp();
        let exp = requested.timestamp();
        let (Some(issued_at), Some(expires_at)) =
            (DateTime::from_timestamp(iat, 0), DateTime::from_timestamp(exp, 0))
        else {
            return Err(SessionValidationError::ExpiryNotAfterIssuance {
                issued_at: now,
                expires_at: requested,
            });
        };
        if exp <= iat {
            return Err(SessionValidationError::ExpiryNotAfterIssuance {
                issued_at,
                expires_at,
            });
        }

        let token_claims = TokenClaims {
            sub: claims.user_id().to_owned(),
            token: claims.token().to_owned(),
            role: claims.role().to_owned(),
            iat,
            exp,
        };
        let token = encode(&Header::new(Algorithm::HS256), &token_claims, &self.encoding).map_err(
            |error| SessionValidationError::Signing {
                message: error.to_string(),
            },
        )?;
        Ok(SignedSession {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Verify `signed` and return its contents.
    ///
    /// Returns `None` for an empty, malformed, tampered or expired token;
    /// the reason is deliberately not exposed.
    pub fn decrypt(&self, signed: &str) -> Option<SessionPayload> {
        if signed.trim().is_empty() {
            return None;
        }
        let data = match decode::<TokenClaims>(signed, &self.decoding, &self.validation) {
            Ok(data) => data,
            Err(error) => {
                debug!(error = %error, "rejected session token");
                return None;
            }
        };
        let TokenClaims {
            sub,
            token,
            role,
            exp,
            ..
        } = data.claims;

        if self.now().timestamp() >= exp {
            debug!(exp, "rejected expired session token");
            return None;
        }
        let claims = SessionClaims::new(sub, token, role).ok()?;
        let expires_at = DateTime::from_timestamp(exp, 0)?;
        Some(SessionPayload { claims, expires_at })
    }

    /// Re-sign a verified payload with a fresh default expiry; claims are
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::encrypt`] failures.
    pub fn reissue(&self, payload: &SessionPayload) -> Result<SignedSession, SessionValidationError> {
        self.encrypt(&payload.claims, None)
    }
}
