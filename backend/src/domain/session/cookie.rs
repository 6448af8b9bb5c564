//! Framework-neutral description of the session cookie.

use std::time::Duration;

/// Name of the cookie holding the signed session.
pub const SESSION_COOKIE_NAME: &str = "session";

/// `SameSite` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

/// How long the browser keeps the cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieLifetime {
    /// Keep for the given duration.
    MaxAge(Duration),
    /// Expire immediately.
    Removal,
}

/// Cookie record written through a
/// [`SessionCookieJar`](crate::domain::ports::SessionCookieJar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSitePolicy,
    pub lifetime: CookieLifetime,
}

impl SessionCookie {
    /// The `session` cookie: HTTP-only, `SameSite=Lax`, path `/`.
    pub fn session(value: impl Into<String>, max_age: Duration, secure: bool) -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_owned(),
            value: value.into(),
            path: "/".to_owned(),
            http_only: true,
            secure,
            same_site: SameSitePolicy::Lax,
            lifetime: CookieLifetime::MaxAge(max_age),
        }
    }

    /// Removal variant of [`Self::session`] with an empty value.
    pub fn removal(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            path: "/".to_owned(),
            http_only: true,
            secure,
            same_site: SameSitePolicy::Lax,
            lifetime: CookieLifetime::Removal,
        }
    }
}
