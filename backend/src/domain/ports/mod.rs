//! Domain ports and supporting types for the hexagonal boundary.
//!
//! The gateway pipeline talks to infrastructure only through these traits:
//! the upstream HTTP transport, the rate-limit state store, and the cookie
//! jar holding the browser session artifact.

mod macros;
pub(crate) use macros::define_port_error;

mod rate_limit_store;
mod session_cookie_jar;
mod upstream_transport;

pub use rate_limit_store::{RateLimitStore, RateLimitStoreError};
#[cfg(test)]
pub use upstream_transport::MockUpstreamTransport;
pub use upstream_transport::{
    FixtureUpstreamTransport, HttpMethod, UpstreamRequest, UpstreamResponse, UpstreamTransport,
    UpstreamTransportError,
};
pub use session_cookie_jar::{MemoryCookieJar, SessionCookieJar};
