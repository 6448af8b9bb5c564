//! Driven port for sending one request to the upstream backend API.
//!
//! The domain owns the request and response shapes so the gateway pipeline
//! stays independent of the HTTP client in use.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use super::define_port_error;

/// HTTP verbs the upstream API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Upper-case wire name of the verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Path relative to the configured upstream base URL.
    pub path: String,
    /// Extra request headers, sent in order.
    pub headers: Vec<(String, String)>,
    /// JSON body, already checked against the caller's input schema.
    pub body: Option<Value>,
}

/// Raw upstream response prior to envelope validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Undecoded response body.
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    /// Build a response from a status and a JSON document.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Whether the status lies in the `2xx` range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

define_port_error! {
    /// Errors surfaced while talking to the upstream API.
    pub enum UpstreamTransportError {
        /// Network transport failed before a full response arrived.
        Transport { message: String } =>
            "upstream transport failed: {message}",
        /// The request could not be built (bad URL, header, or body).
        InvalidRequest { message: String } =>
            "upstream request invalid: {message}",
    }
}

/// Port for dispatching one request to the upstream API.
///
/// Implementations must not retry: one gateway call issues exactly one
/// request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Send `request` and return the raw response.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use gateway::domain::ports::{
    ///     FixtureUpstreamTransport, HttpMethod, UpstreamRequest, UpstreamTransport,
    /// };
    ///
    /// let transport = FixtureUpstreamTransport;
    /// let response = transport
    ///     .send(UpstreamRequest {
    ///         method: HttpMethod::Get,
    ///         path: "/projects".to_owned(),
    ///         headers: Vec::new(),
    ///         body: None,
    ///     })
    ///     .await?;
    /// assert_eq!(response.status, 200);
    /// # Ok::<(), gateway::domain::ports::UpstreamTransportError>(())
    /// ```
    async fn send(
        &self,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse, UpstreamTransportError>;
}

/// Fixture implementation answering every request with an empty success
/// envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureUpstreamTransport;

#[async_trait]
impl UpstreamTransport for FixtureUpstreamTransport {
    async fn send(
        &self,
        _request: UpstreamRequest,
    ) -> Result<UpstreamResponse, UpstreamTransportError> {
        Ok(UpstreamResponse::json(
            200,
            &serde_json::json!({ "success": true, "message": "ok", "data": null }),
        ))
    }
}
