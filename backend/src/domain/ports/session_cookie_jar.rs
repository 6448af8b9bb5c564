//! Port over the browser cookie storage holding the session artifact.

use std::collections::HashMap;

use crate::domain::session::{CookieLifetime, SessionCookie};

/// Minimal cookie jar used by the session lifecycle.
///
/// Inbound adapters implement this over their framework's request and
/// response cookies; reads observe writes made earlier in the same request.
/// Removal is a write whose lifetime is [`CookieLifetime::Removal`].
pub trait SessionCookieJar {
    /// Current value of cookie `name`, if present and not removed.
    fn read(&self, name: &str) -> Option<String>;

    /// Store, replace or remove a cookie.
    fn write(&mut self, cookie: SessionCookie);
}

/// In-memory jar for services that do not run behind a browser (and for
/// tests).
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    cookies: HashMap<String, SessionCookie>,
}

impl MemoryCookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full cookie record for `name`, including attributes.
    pub fn cookie(&self, name: &str) -> Option<&SessionCookie> {
        self.cookies.get(name)
    }
}

impl SessionCookieJar for MemoryCookieJar {
    fn read(&self, name: &str) -> Option<String> {
        self.cookies
            .get(name)
            .filter(|cookie| cookie.lifetime != CookieLifetime::Removal)
            .map(|cookie| cookie.value.clone())
    }

    fn write(&mut self, cookie: SessionCookie) {
        self.cookies.insert(cookie.name.clone(), cookie);
    }
}
