//! Gateway entry-point: serves the auth endpoints over the gateway pipeline.

use std::ffi::OsString;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use mockable::{Clock, DefaultClock, DefaultEnv};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use gateway::config::{BuildMode, GatewaySettings, session_settings_from_env};
use gateway::domain::AuthService;
use gateway::domain::session::{SessionCodec, SessionManager};
use gateway::inbound::http::auth;

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = GatewaySettings::load_from_iter([OsString::from("gateway")])
        .map_err(std::io::Error::other)?;
    let session = session_settings_from_env(&DefaultEnv::new(), BuildMode::from_debug_assertions())
        .map_err(std::io::Error::other)?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let gateway = settings
        .build_gateway(Arc::clone(&clock))
        .map_err(std::io::Error::other)?;
    let sessions = SessionManager::new(
        SessionCodec::new(&session.secret, clock),
        settings.cookie_secure(),
    );
    let service = web::Data::new(AuthService::new(Arc::new(gateway), sessions));

    info!(
        timeout = ?settings.timeout(),
        rate_limit = ?settings.rate_limit_policy(),
        session_secret = %session.secret.fingerprint(),
        "gateway starting"
    );
    HttpServer::new(move || App::new().app_data(service.clone()).configure(auth::configure))
        .bind(("0.0.0.0", 8080))?
        .run()
        .await
}
