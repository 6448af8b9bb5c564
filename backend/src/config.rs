//! Environment-driven configuration for the gateway.
//!
//! [`GatewaySettings`] is loaded through OrthoConfig (prefix `GATEWAY`);
//! session secrets are read separately by [`session_settings_from_env`] so
//! they never pass through generic configuration layers.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::domain::gateway::{GatewayClient, GatewayDefaults};
use crate::domain::rate_limit::{EvictionPolicy, RateLimitPolicy, RateLimiter};
use crate::outbound::upstream::ReqwestUpstreamTransport;

mod session;

pub use session::{BuildMode, SessionConfigError, SessionSettings, session_settings_from_env};

/// Errors raised while turning settings into runtime components.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// `GATEWAY_API_URL` is not set.
    #[error("missing upstream API URL; set GATEWAY_API_URL")]
    MissingApiUrl,
    /// `GATEWAY_API_URL` is not an absolute http(s) URL.
    #[error("invalid upstream API URL '{value}': {reason}")]
    InvalidApiUrl { value: String, reason: String },
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 1_000;

/// Gateway settings.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GATEWAY")]
pub struct GatewaySettings {
    /// Base URL of the upstream backend API.
    pub api_url: Option<String>,
    /// Per-call timeout budget in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Default minimum spacing between calls per identity, in milliseconds.
    pub rate_limit_window_ms: Option<u64>,
    /// Maximum identities tracked by the in-memory rate-limit store.
    pub max_identities: Option<usize>,
    /// Whether the session cookie carries the `Secure` attribute.
    pub cookie_secure: Option<bool>,
}

impl GatewaySettings {
    /// Parsed upstream base URL.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the URL is missing, unparsable or not
    /// http(s).
    pub fn api_url(&self) -> Result<Url, SettingsError> {
        let raw = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SettingsError::MissingApiUrl)?;
        let url = Url::parse(raw).map_err(|error| SettingsError::InvalidApiUrl {
            value: raw.to_owned(),
            reason: error.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SettingsError::InvalidApiUrl {
                value: raw.to_owned(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url)
    }

    /// Per-call timeout budget, ten seconds unless configured.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// Default rate-limit policy, one call per second unless configured.
    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::from_millis(
            self.rate_limit_window_ms
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_MS),
        )
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        let defaults = EvictionPolicy::default();
        EvictionPolicy {
            max_identities: self.max_identities.unwrap_or(defaults.max_identities),
            ..defaults
        }
    }

    /// Whether session cookies are marked `Secure`; on unless disabled.
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure.unwrap_or(true)
    }

    pub fn gateway_defaults(&self) -> GatewayDefaults {
        GatewayDefaults {
            rate_limit: self.rate_limit_policy(),
            timeout: self.timeout(),
        }
    }

    /// Assemble a [`GatewayClient`] over the reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the URL is invalid or the HTTP client
    /// cannot be built.
    pub fn build_gateway(&self, clock: Arc<dyn Clock>) -> Result<GatewayClient, SettingsError> {
        let transport = ReqwestUpstreamTransport::new(self.api_url()?)?;
        let limiter = RateLimiter::in_memory(self.eviction_policy(), clock);
        Ok(GatewayClient::new(Arc::new(transport), limiter).with_defaults(self.gateway_defaults()))
    }
}
