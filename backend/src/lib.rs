//! Resilient gateway between callers and an upstream backend API.
//!
//! Every call is throttled per identity, bounded by a timeout, validated on
//! the way out and checked against the `{message, data}` envelope on the way
//! back. Signed session tokens persist authentication in an HTTP-only cookie.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
