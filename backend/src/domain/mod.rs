//! Domain types and services of the backend gateway.
//!
//! Purpose: keep the call pipeline (rate limiting, timeouts, validation and
//! session handling) independent of HTTP frameworks and clients. Adapters in
//! `inbound` and `outbound` plug into the traits in [`ports`].
//!
//! Public surface:
//! - [`GatewayClient`] and [`GatewayCall`]: the outbound call pipeline.
//! - [`ApiResult`]: normalised outcome of every call.
//! - [`Identity`]: per-caller rate-limit key.
//! - [`AuthService`]: login, signup and logout over the gateway.

pub mod api_result;
pub mod auth;
pub mod envelope;
pub mod gateway;
pub mod identity;
pub mod ports;
pub mod rate_limit;
pub mod request_cache;
pub mod schema;
pub mod session;
pub mod timeout;

pub use self::api_result::{ApiFailure, ApiResult, ApiSuccess, FailureKind, FieldDetail};
pub use self::auth::{AuthError, AuthService, LoginCredentials, Registration};
pub use self::gateway::{GatewayCall, GatewayClient, GatewayDefaults, GatewayError, GatewayRequest};
pub use self::identity::{Identity, IdentityValidationError};
pub use self::request_cache::{CacheKey, RequestCache};
