//! HTTP inbound adapter: actix-web cookie plumbing and auth endpoints.

pub mod auth;
pub mod session;

pub use session::SessionCookies;
