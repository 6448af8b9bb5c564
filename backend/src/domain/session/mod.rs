//! Signed session credentials and their browser-cookie lifecycle.
//!
//! [`SessionCodec`] issues and verifies HS256-signed session tokens;
//! [`SessionManager`] stores them in the `session` cookie through the
//! [`SessionCookieJar`](crate::domain::ports::SessionCookieJar) port.
//! Invalid or expired sessions are never errors: they read as "no session".

mod claims;
mod codec;
mod cookie;
mod manager;
mod secret;

pub use claims::{SessionClaims, SessionPayload, SessionValidationError, SignedSession};
pub use codec::{DEFAULT_SESSION_TTL, SessionCodec};
pub use cookie::{CookieLifetime, SESSION_COOKIE_NAME, SameSitePolicy, SessionCookie};
pub use manager::SessionManager;
pub use secret::{SESSION_SECRET_MIN_LEN, SessionSecret, SessionSecretError};
