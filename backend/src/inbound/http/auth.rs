//! Authentication endpoints.
//!
//! ```text
//! POST /auth/login    {"username":"alice","password":"..."}
//! POST /auth/signup   {"name":"Ada","email":"ada@example.com","password":"..."}
//! POST /auth/logout
//! GET  /auth/session
//! ```
//!
//! Bodies are the wire form of [`ApiResult`]; the HTTP status mirrors the
//! result's status. Fatal gateway errors answer `502 Bad Gateway`.
//! `GET /auth/session` refreshes the session cookie it reads.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::session::SessionCookies;
use crate::domain::api_result::{ApiFailure, ApiResult};
use crate::domain::auth::{
    AuthError, AuthService, LoginCredentials, LoginValidationError, Registration,
    RegistrationValidationError,
};
use crate::domain::schema::ValidationError;
use crate::domain::session::SessionPayload;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Signup request body.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Session facts safe to hand to the browser; the upstream token stays in
/// the signed cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user_id: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&SessionPayload> for SessionView {
    fn from(payload: &SessionPayload) -> Self {
        Self {
            user_id: payload.claims.user_id().to_owned(),
            role: payload.claims.role().to_owned(),
            expires_at: payload.expires_at,
        }
    }
}

/// Register the auth routes under `/auth`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::post().to(login))
            .route("/signup", web::post().to(signup))
            .route("/logout", web::post().to(logout))
            .route("/session", web::get().to(current_session)),
    );
}

async fn login(
    service: web::Data<AuthService>,
    mut cookies: SessionCookies,
    body: web::Json<LoginRequest>,
) -> actix_web::Result<HttpResponse> {
    let credentials = match LoginCredentials::try_from_parts(&body.username, &body.password) {
        Ok(credentials) => credentials,
        Err(error) => {
            let path = match error {
                LoginValidationError::EmptyUsername => "$.username",
                LoginValidationError::EmptyPassword => "$.password",
            };
            return Ok(invalid_input(path, &error.to_string()));
        }
    };
    let outcome = service.login(&mut cookies, &credentials).await;
    respond(outcome, cookies)
}

async fn signup(
    service: web::Data<AuthService>,
    mut cookies: SessionCookies,
    body: web::Json<SignupRequest>,
) -> actix_web::Result<HttpResponse> {
    let registration =
        match Registration::try_from_parts(&body.name, &body.email, &body.password) {
            Ok(registration) => registration,
            Err(error) => {
                let path = match error {
                    RegistrationValidationError::EmptyName => "$.name",
                    RegistrationValidationError::InvalidEmail => "$.email",
                    RegistrationValidationError::PasswordTooShort { .. } => "$.password",
                };
                return Ok(invalid_input(path, &error.to_string()));
            }
        };
    let outcome = service.signup(&mut cookies, &registration).await;
    respond(outcome, cookies)
}

async fn logout(
    service: web::Data<AuthService>,
    mut cookies: SessionCookies,
) -> actix_web::Result<HttpResponse> {
    service.logout(&mut cookies);
    let mut response = HttpResponse::NoContent().finish();
    cookies.apply(&mut response)?;
    Ok(response)
}

/// Reading the session also re-stamps its expiry.
async fn current_session(
    service: web::Data<AuthService>,
    mut cookies: SessionCookies,
) -> actix_web::Result<HttpResponse> {
    let refreshed = service.touch_session(&mut cookies).map_err(|err| {
        error!(error = %err, "session refresh failed");
        actix_web::error::ErrorInternalServerError(err)
    })?;
    let Some(session) = refreshed else {
        return Ok(HttpResponse::Unauthorized().finish());
    };
    let mut response = HttpResponse::Ok().json(SessionView::from(&session));
    cookies.apply(&mut response)?;
    Ok(response)
}

fn respond(
    outcome: Result<ApiResult<SessionPayload>, AuthError>,
    cookies: SessionCookies,
) -> actix_web::Result<HttpResponse> {
    let result = match outcome {
        Ok(result) => result.map(|session| SessionView::from(&session)),
        Err(err) => {
            error!(error = %err, "authentication failed");
            return Ok(HttpResponse::BadGateway().json(serde_json::json!({
                "ok": false,
                "status": 502,
                "message": "upstream unavailable",
            })));
        }
    };
    let status = StatusCode::from_u16(result.status()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = HttpResponse::build(status).json(&result);
    cookies.apply(&mut response)?;
    Ok(response)
}

fn invalid_input(path: &str, message: &str) -> HttpResponse {
    let result: ApiResult<SessionView> =
        ApiFailure::local_validation(ValidationError::at(path, message)).into();
    HttpResponse::BadRequest().json(&result)
}
