//! Reqwest-backed upstream transport.
//!
//! This adapter owns transport details only: URL joining, header and body
//! serialisation, and error mapping. Non-2xx responses are returned as-is
//! for envelope validation; deadlines are enforced by the gateway, not here.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use tracing::debug;

use crate::domain::ports::{
    HttpMethod, UpstreamRequest, UpstreamResponse, UpstreamTransport, UpstreamTransportError,
};

const DEFAULT_USER_AGENT: &str = concat!("gateway/", env!("CARGO_PKG_VERSION"));

/// Transport sending every request to paths under one base URL.
pub struct ReqwestUpstreamTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestUpstreamTransport {
    /// Build a transport with a default reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(DEFAULT_USER_AGENT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Build a transport around an existing client.
    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self {
            client,
            base_url: normalise_base(base_url),
        }
    }

    /// Base URL every path is resolved against, with a trailing slash.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamTransportError> {
        let joined = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|error| {
                UpstreamTransportError::invalid_request(format!("invalid path {path:?}: {error}"))
            })?;
        if !joined.as_str().starts_with(self.base_url.as_str()) {
            return Err(UpstreamTransportError::invalid_request(format!(
                "path {path:?} resolves outside the upstream base URL"
            )));
        }
        Ok(joined)
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestUpstreamTransport {
    async fn send(
        &self,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse, UpstreamTransportError> {
        let url = self.endpoint(&request.path)?;
        let headers = build_headers(&request.headers)?;
        let mut builder = self
            .client
            .request(method(request.method), url)
            .header(ACCEPT, "application/json")
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(status, bytes = body.len(), "upstream responded");
        Ok(UpstreamResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn normalise_base(mut base_url: Url) -> Url {
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    base_url.set_query(None);
    base_url.set_fragment(None);
    base_url
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap, UpstreamTransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            UpstreamTransportError::invalid_request(format!("invalid header name {name:?}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            UpstreamTransportError::invalid_request(format!("invalid value for header {name}"))
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

fn map_transport_error(error: reqwest::Error) -> UpstreamTransportError {
    if error.is_builder() {
        UpstreamTransportError::invalid_request(error.to_string())
    } else {
        UpstreamTransportError::transport(error.to_string())
    }
}
