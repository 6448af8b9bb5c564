//! Session lifecycle over a cookie jar.

use std::time::Duration;

use tracing::{debug, info};

use super::claims::{SessionClaims, SessionPayload, SessionValidationError, SignedSession};
use super::codec::SessionCodec;
use super::cookie::{SESSION_COOKIE_NAME, SessionCookie};
use crate::domain::ports::SessionCookieJar;

/// Creates, reads, refreshes and destroys the `session` cookie.
pub struct SessionManager {
    codec: SessionCodec,
    cookie_secure: bool,
}

impl SessionManager {
    /// `cookie_secure` controls the `Secure` attribute; disable it only for
    /// local plain-HTTP development.
    pub fn new(codec: SessionCodec, cookie_secure: bool) -> Self {
        Self {
            codec,
            cookie_secure,
        }
    }

    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Issue a session for `claims` and store it in `jar`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionValidationError`] when the session cannot be signed.
    pub fn create<J>(
        &self,
        jar: &mut J,
        claims: &SessionClaims,
    ) -> Result<SessionPayload, SessionValidationError>
    where
        J: SessionCookieJar + ?Sized,
    {
        let signed = self.codec.encrypt(claims, None)?;
        let payload = SessionPayload {
            claims: claims.clone(),
            expires_at: signed.expires_at,
        };
        self.store(jar, signed);
        info!(user_id = %payload.claims.user_id(), expires_at = %payload.expires_at, "session created");
        Ok(payload)
    }

    /// Verified session stored in `jar`, if any.
    pub fn current<J>(&self, jar: &J) -> Option<SessionPayload>
    where
        J: SessionCookieJar + ?Sized,
    {
        jar.read(SESSION_COOKIE_NAME)
            .and_then(|value| self.codec.decrypt(&value))
    }

    /// Re-stamp the stored session's expiry, leaving claims untouched.
    ///
    /// Returns `Ok(None)` without writing anything when no valid session
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`SessionValidationError`] when the session cannot be
    /// re-signed.
    pub fn refresh<J>(&self, jar: &mut J) -> Result<Option<SessionPayload>, SessionValidationError>
    where
        J: SessionCookieJar + ?Sized,
    {
        let Some(current) = self.current(jar) else {
            debug!("no valid session to refresh");
            return Ok(None);
        };
        let signed = self.codec.reissue(&current)?;
        let refreshed = SessionPayload {
            claims: current.claims,
            expires_at: signed.expires_at,
        };
        self.store(jar, signed);
        Ok(Some(refreshed))
    }

    /// Remove the session cookie from the client. The removal cookie keeps
    /// the session cookie's attributes so browsers match and drop it.
    pub fn destroy<J>(&self, jar: &mut J)
    where
        J: SessionCookieJar + ?Sized,
    {
        jar.write(SessionCookie::removal(SESSION_COOKIE_NAME, self.cookie_secure));
        debug!("session cookie removed");
    }

    fn store<J>(&self, jar: &mut J, signed: SignedSession)
    where
        J: SessionCookieJar + ?Sized,
    {
        let max_age = (signed.expires_at - signed.issued_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        jar.write(SessionCookie::session(
            signed.token,
            max_age,
            self.cookie_secure,
        ));
    }
}
