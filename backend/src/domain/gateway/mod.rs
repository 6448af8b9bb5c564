//! The outbound call pipeline shared by every feature service.
//!
//! `execute` walks one call through:
//!
//! 1. rate check (429 "too many requests", no network call);
//! 2. local validation of the request body (400 "invalid data");
//! 3. dispatch through the transport under a deadline (408 "request timed
//!    out"); transport failures and panics are fatal;
//! 4. envelope validation of the response.
//!
//! Expected failures come back as [`ApiResult::Failure`]; only fatal
//! conditions are `Err`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::api_result::{ApiFailure, ApiResult};
use super::envelope::parse_envelope;
use super::ports::{RateLimitStoreError, UpstreamRequest, UpstreamTransport, UpstreamTransportError};
use super::rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
use super::request_cache::{CacheKey, RequestCache};
use super::schema::{Schema, ValidationError};
use super::timeout::{TimeoutError, with_timeout};

mod request;

pub use request::{GatewayCall, GatewayRequest};

/// Default per-call timeout budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fatal gateway failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The transport failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] UpstreamTransportError),
    /// The dispatch task panicked.
    #[error("upstream dispatch panicked: {message}")]
    DispatchPanicked { message: String },
    /// Rate-limit state could not be read.
    #[error(transparent)]
    StateUnavailable(#[from] RateLimitStoreError),
}

/// Settings applied to calls that do not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayDefaults {
    pub rate_limit: RateLimitPolicy,
    pub timeout: Duration,
}

impl Default for GatewayDefaults {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Composes rate limiting, validation, timeout and envelope checks around an
/// [`UpstreamTransport`].
pub struct GatewayClient {
    transport: Arc<dyn UpstreamTransport>,
    rate_limiter: RateLimiter,
    defaults: GatewayDefaults,
}

impl GatewayClient {
    pub fn new(transport: Arc<dyn UpstreamTransport>, rate_limiter: RateLimiter) -> Self {
        Self {
            transport,
            rate_limiter,
            defaults: GatewayDefaults::default(),
        }
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: GatewayDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &GatewayDefaults {
        &self.defaults
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Run `call` through the full pipeline.
    ///
    /// A request without a body is validated as JSON `null`; a validated
    /// input that serialises to `null` is sent without a body.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the transport fails, the dispatch task
    /// panics, or rate-limit state is unavailable.
    pub async fn execute<I, T, SI, SP>(
        &self,
        call: GatewayCall,
        input_schema: &SI,
        payload_schema: &SP,
    ) -> Result<ApiResult<T>, GatewayError>
    where
        I: Serialize,
        SI: Schema<I> + ?Sized,
        SP: Schema<T> + ?Sized,
    {
        let call_id = Uuid::new_v4();
        let span = info_span!(
            "gateway_call",
            %call_id,
            identity = %call.identity,
            method = %call.request.method(),
            path = %call.request.path(),
        );
        self.run(call, input_schema, payload_schema)
            .instrument(span)
            .await
    }

    async fn run<I, T, SI, SP>(
        &self,
        call: GatewayCall,
        input_schema: &SI,
        payload_schema: &SP,
    ) -> Result<ApiResult<T>, GatewayError>
    where
        I: Serialize,
        SI: Schema<I> + ?Sized,
        SP: Schema<T> + ?Sized,
    {
        let GatewayCall {
            identity,
            request,
            rate_limit,
            timeout,
        } = call;
        let policy = rate_limit.unwrap_or(self.defaults.rate_limit);
        let budget = timeout.unwrap_or(self.defaults.timeout);

        let decision = self.rate_limiter.check(&identity, &policy).map_err(|err| {
            error!(error = %err, outcome = "state_unavailable", "rate limit state unavailable");
            GatewayError::from(err)
        })?;
        if let RateLimitDecision::Rejected { retry_after } = decision {
            info!(
                status = 429,
                retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                outcome = "rate_limited",
                "gateway call rejected"
            );
            return Ok(ApiFailure::rate_limited(retry_after).into());
        }

        let (method, path, headers, raw_body) = request.into_parts();
        let body = match validate_input(input_schema, raw_body.as_ref().unwrap_or(&Value::Null)) {
            Ok(body) => body,
            Err(validation) => {
                info!(status = 400, outcome = "invalid_input", issues = %validation, "gateway call rejected");
                return Ok(ApiFailure::local_validation(validation).into());
            }
        };

        let upstream_request = UpstreamRequest {
            method,
            path,
            headers,
            body,
        };
        let transport = Arc::clone(&self.transport);
        let dispatched = with_timeout(
            async move { transport.send(upstream_request).await },
            budget,
        )
        .await;

        let response = match dispatched {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                error!(error = %err, outcome = "transport_failed", "gateway call failed");
                return Err(err.into());
            }
            Err(TimeoutError::Elapsed { budget }) => {
                warn!(
                    status = 408,
                    budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                    outcome = "timed_out",
                    "gateway call timed out"
                );
                return Ok(ApiFailure::timeout().into());
            }
            Err(TimeoutError::Panicked { message }) => {
                error!(error = %message, outcome = "dispatch_panicked", "gateway call failed");
                return Err(GatewayError::DispatchPanicked { message });
            }
        };

        let result = parse_envelope(&response, payload_schema);
        match result.failure() {
            None => info!(status = result.status(), outcome = "ok", "gateway call succeeded"),
            Some(failure) => info!(
                status = failure.status(),
                upstream_message = failure.message(),
                outcome = "failed",
                "gateway call returned a failure"
            ),
        }
        Ok(result)
    }

    /// [`Self::execute`] memoised in the active [`RequestCache`] scope.
    ///
    /// Keys combine method and path with the identity, the headers (names
    /// lowercased and sorted) and the raw body. Only successful results are
    /// cached, so a rejected or failed call is retried on the next
    /// invocation. Outside a scope this is plain
    /// `execute`.
    ///
    /// # Errors
    ///
    /// As for [`Self::execute`].
    pub async fn execute_cached<I, T, SI, SP>(
        &self,
        call: GatewayCall,
        input_schema: &SI,
        payload_schema: &SP,
    ) -> Result<ApiResult<T>, GatewayError>
    where
        I: Serialize,
        T: Clone + Send + Sync + 'static,
        SI: Schema<I> + ?Sized,
        SP: Schema<T> + ?Sized,
    {
        let key = cache_key(&call);
        RequestCache::memoize_if(
            key,
            || self.execute(call, input_schema, payload_schema),
            |outcome| matches!(outcome, Ok(result) if result.is_ok()),
        )
        .await
    }
}

fn validate_input<I, SI>(schema: &SI, raw: &Value) -> Result<Option<Value>, ValidationError>
where
    I: Serialize,
    SI: Schema<I> + ?Sized,
{
    let validated = schema.validate(raw)?;
    let encoded = serde_json::to_value(&validated)?;
    Ok((!encoded.is_null()).then_some(encoded))
}

fn cache_key(call: &GatewayCall) -> CacheKey {
    let request = call.request();
    let body = request.body().map(Value::to_string).unwrap_or_default();
    let mut headers: Vec<(String, &str)> = request
        .headers()
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
        .collect();
    headers.sort_unstable();
    let headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    CacheKey::new(
        format!("{} {}", request.method(), request.path()),
        format!("{}\n{headers}{body}", call.identity().as_str()),
    )
}

#[cfg(test)]
mod tests;
