//! Operator CLI issuing one call through the gateway pipeline.
//!
//! ```text
//! GATEWAY_API_URL=https://api.example.test gateway-probe --identity ops GET /health
//! ```
//!
//! Prints the normalised result as JSON and exits non-zero on fatal errors.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use gateway::config::GatewaySettings;
use gateway::domain::ports::HttpMethod;
use gateway::domain::schema::AnyJson;
use gateway::domain::{GatewayCall, GatewayRequest, Identity};

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "UPPER")]
enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<Method> for HttpMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::Get,
            Method::Post => Self::Post,
            Method::Put => Self::Put,
            Method::Patch => Self::Patch,
            Method::Delete => Self::Delete,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "gateway-probe", about = "Send one request through the gateway")]
struct Cli {
    /// HTTP method.
    method: Method,
    /// Path relative to GATEWAY_API_URL.
    path: String,
    /// JSON request body.
    #[arg(long)]
    body: Option<String>,
    /// Rate-limit identity for the call.
    #[arg(long, default_value = "gateway-probe")]
    identity: String,
    /// Bearer token sent as `Authorization`.
    #[arg(long)]
    token: Option<String>,
    /// Override the configured timeout, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(std::io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();
    let settings = GatewaySettings::load_from_iter([OsString::from("gateway-probe")])
        .wrap_err("failed to load gateway settings")?;
    let gateway = settings
        .build_gateway(Arc::new(DefaultClock))
        .wrap_err("failed to build gateway")?;

    let mut request = GatewayRequest::new(cli.method.into(), cli.path);
    if let Some(raw) = cli.body.as_deref() {
        let body: Value = serde_json::from_str(raw).wrap_err("--body must be valid JSON")?;
        request = request.with_body(body);
    }
    if let Some(token) = cli.token.as_deref() {
        request = request.with_bearer(token);
    }
    let identity = Identity::new(cli.identity).wrap_err("--identity must not be blank")?;
    let mut call = GatewayCall::new(identity, request);
    if let Some(timeout_ms) = cli.timeout_ms {
        call = call.with_timeout(Duration::from_millis(timeout_ms));
    }

    let result = gateway.execute(call, &AnyJson, &AnyJson).await?;
    let rendered = serde_json::to_string_pretty(&result)?;
    writeln!(std::io::stdout().lock(), "{rendered}")?;
    Ok(())
}
