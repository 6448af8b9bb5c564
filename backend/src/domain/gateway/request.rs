//! Call descriptions handed to the gateway by feature services.

use std::time::Duration;

use serde_json::Value;

use crate::domain::Identity;
use crate::domain::ports::HttpMethod;
use crate::domain::rate_limit::RateLimitPolicy;

/// Outbound request before local validation.
///
/// # Examples
/// ```
/// use gateway::domain::gateway::GatewayRequest;
/// use gateway::domain::ports::HttpMethod;
/// use serde_json::json;
///
/// let request = GatewayRequest::post("/projects", json!({ "name": "Apollo" }))
///     .with_bearer("secret-token");
/// assert_eq!(request.method(), HttpMethod::Post);
/// assert_eq!(request.header("authorization"), Some("Bearer secret-token"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl GatewayRequest {
    /// Request with no body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, path).with_body(body)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a header; later headers with the same name are also sent.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub(super) fn into_parts(self) -> (HttpMethod, String, Vec<(String, String)>, Option<Value>) {
        (self.method, self.path, self.headers, self.body)
    }
}

/// One gateway invocation: who is calling, what to send, and optional
/// overrides of the client's rate-limit policy and timeout.
#[derive(Debug, Clone)]
pub struct GatewayCall {
    pub(super) identity: Identity,
    pub(super) request: GatewayRequest,
    pub(super) rate_limit: Option<RateLimitPolicy>,
    pub(super) timeout: Option<Duration>,
}

impl GatewayCall {
    pub fn new(identity: Identity, request: GatewayRequest) -> Self {
        Self {
            identity,
            request,
            rate_limit: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = Some(policy);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn request(&self) -> &GatewayRequest {
        &self.request
    }
}
