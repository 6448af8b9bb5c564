//! Authentication primitives and the login/signup feature service.
//!
//! Keep inbound payload parsing outside the domain by exposing constructors
//! that validate string inputs before a handler talks to the gateway.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

use super::api_result::{ApiResult, ApiSuccess};
use super::gateway::{GatewayCall, GatewayClient, GatewayError, GatewayRequest};
use super::identity::{Identity, IdentityValidationError};
use super::ports::SessionCookieJar;
use super::rate_limit::RateLimitPolicy;
use super::schema::{JsonSchema, SchemaExt};
use super::session::{SessionClaims, SessionManager, SessionPayload, SessionValidationError};

/// Upstream login route.
pub const LOGIN_PATH: &str = "/auth/login";
/// Upstream registration route.
pub const REGISTER_PATH: &str = "/auth/register";
/// One login or signup attempt per identity every two seconds.
pub const AUTH_RATE_LIMIT: RateLimitPolicy = RateLimitPolicy::from_millis(2_000);

/// Domain error returned when login payload values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginValidationError {
    /// Username was missing or blank once trimmed.
    EmptyUsername,
    /// Password was blank.
    EmptyPassword,
}

impl fmt::Display for LoginValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "username must not be empty"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
        }
    }
}

impl std::error::Error for LoginValidationError {}

/// Validated login credentials used by authentication services.
///
/// ## Invariants
/// - `username` is trimmed and must not be empty after trimming.
/// - `password` is required to be non-empty but retains caller-provided
///   whitespace to avoid surprising credential comparisons.
///
/// # Examples
/// ```
/// use gateway::domain::auth::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts(" Admin ", "password").expect("valid");
/// assert_eq!(creds.username(), "Admin");
/// assert_eq!(creds.password(), "password");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    username: String,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw username/password inputs.
    pub fn try_from_parts(username: &str, password: &str) -> Result<Self, LoginValidationError> {
        let normalized = username.trim();
        if normalized.is_empty() {
            return Err(LoginValidationError::EmptyUsername);
        }

        if password.is_empty() {
            return Err(LoginValidationError::EmptyPassword);
        }

        Ok(Self {
            username: normalized.to_owned(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Username string suitable for user lookups.
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Password string provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Domain error returned when signup payload values are invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("email must contain a local part and a domain")]
    InvalidEmail,
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}

/// Validated signup request.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    name: String,
    email: String,
    password: Zeroizing<String>,
}

impl Registration {
    /// Minimum password length in characters.
    pub const MIN_PASSWORD_LEN: usize = 8;

    /// Validate raw signup inputs. The email is trimmed and lower-cased.
    pub fn try_from_parts(
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Self, RegistrationValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistrationValidationError::EmptyName);
        }
        let email = email.trim().to_lowercase();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(RegistrationValidationError::InvalidEmail);
        }
        if password.chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(RegistrationValidationError::PasswordTooShort {
                min: Self::MIN_PASSWORD_LEN,
            });
        }
        Ok(Self {
            name: name.to_owned(),
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// User record returned by the upstream auth routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub role: String,
}

/// Payload of a successful login or signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user: AuthenticatedUser,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
}

/// Errors that abort an authentication flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to issue session: {0}")]
    Session(#[from] SessionValidationError),
    #[error("invalid rate-limit identity: {0}")]
    Identity(#[from] IdentityValidationError),
}

/// Login, signup and logout over the gateway and the session cookie.
pub struct AuthService {
    gateway: Arc<GatewayClient>,
    sessions: SessionManager,
}

impl AuthService {
    pub fn new(gateway: Arc<GatewayClient>, sessions: SessionManager) -> Self {
        Self { gateway, sessions }
    }

    /// Authenticate upstream and, on success, store a signed session.
    ///
    /// Expected failures (rate limiting, bad credentials, malformed
    /// payloads) come back as [`ApiResult::Failure`] and leave the jar
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] for fatal gateway failures or when the session
    /// cannot be signed.
    pub async fn login<J>(
        &self,
        jar: &mut J,
        credentials: &LoginCredentials,
    ) -> Result<ApiResult<SessionPayload>, AuthError>
    where
        J: SessionCookieJar + ?Sized,
    {
        let identity = Identity::new(credentials.username().to_lowercase())?;
        let request = GatewayRequest::post(
            LOGIN_PATH,
            json!({ "username": credentials.username(), "password": credentials.password() }),
        );
        let result = self
            .authenticate(identity, request, &JsonSchema::<LoginBody>::new())
            .await?;
        self.open_session(jar, result)
    }

    /// Register upstream and, on success, store a signed session.
    ///
    /// # Errors
    ///
    /// As for [`Self::login`].
    pub async fn signup<J>(
        &self,
        jar: &mut J,
        registration: &Registration,
    ) -> Result<ApiResult<SessionPayload>, AuthError>
    where
        J: SessionCookieJar + ?Sized,
    {
        let identity = Identity::new(registration.email())?;
        let request = GatewayRequest::post(
            REGISTER_PATH,
            json!({
                "name": registration.name(),
                "email": registration.email(),
                "password": registration.password.as_str(),
            }),
        );
        let result = self
            .authenticate(identity, request, &JsonSchema::<RegisterBody>::new())
            .await?;
        self.open_session(jar, result)
    }

    /// Remove the session cookie.
    pub fn logout<J>(&self, jar: &mut J)
    where
        J: SessionCookieJar + ?Sized,
    {
        self.sessions.destroy(jar);
    }

    /// Verified session in `jar`, if any.
    pub fn current_session<J>(&self, jar: &J) -> Option<SessionPayload>
    where
        J: SessionCookieJar + ?Sized,
    {
        self.sessions.current(jar)
    }

    /// Extend the stored session's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Session`] when re-signing fails.
    pub fn touch_session<J>(&self, jar: &mut J) -> Result<Option<SessionPayload>, AuthError>
    where
        J: SessionCookieJar + ?Sized,
    {
        Ok(self.sessions.refresh(jar)?)
    }

    async fn authenticate<B>(
        &self,
        identity: Identity,
        request: GatewayRequest,
        input_schema: &JsonSchema<B>,
    ) -> Result<ApiResult<AuthPayload>, AuthError>
    where
        B: Serialize + serde::de::DeserializeOwned,
    {
        let payload_schema = JsonSchema::<AuthPayload>::new().refine(
            "$.token",
            "token must not be blank",
            |payload: &AuthPayload| !payload.token.trim().is_empty(),
        );
        let call = GatewayCall::new(identity, request).with_policy(AUTH_RATE_LIMIT);
        Ok(self
            .gateway
            .execute(call, input_schema, &payload_schema)
            .await?)
    }

    fn open_session<J>(
        &self,
        jar: &mut J,
        result: ApiResult<AuthPayload>,
    ) -> Result<ApiResult<SessionPayload>, AuthError>
    where
        J: SessionCookieJar + ?Sized,
    {
        let ApiSuccess {
            status,
            message,
            data,
        } = match result.into_result() {
            Ok(success) => success,
            Err(failure) => return Ok(ApiResult::Failure(failure)),
        };
        let claims = SessionClaims::new(data.user.id, data.token, data.user.role)?;
        let session = self.sessions.create(jar, &claims)?;
        info!(user_id = %session.claims.user_id(), "authenticated");
        Ok(ApiResult::Success(ApiSuccess {
            status,
            message,
            data: session,
        }))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for credentials and the auth flows.
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::ports::{MemoryCookieJar, MockUpstreamTransport, UpstreamResponse};
    use crate::domain::rate_limit::{EvictionPolicy, RateLimiter};
    use crate::domain::session::{SESSION_COOKIE_NAME, SessionCodec, SessionSecret};
    use crate::test_support::MutableClock;

    #[rstest]
    #[case("", "pw", LoginValidationError::EmptyUsername)]
    #[case("   ", "pw", LoginValidationError::EmptyUsername)]
    #[case("user", "", LoginValidationError::EmptyPassword)]
    fn invalid_credentials(
        #[case] username: &str,
        #[case] password: &str,
        #[case] expected: LoginValidationError,
    ) {
        let err = LoginCredentials::try_from_parts(username, password)
            .expect_err("invalid inputs must fail");
        assert_eq!(err, expected);
    }

    #[rstest]
    #[case("  admin  ", "secret")]
    #[case("alice", "correct horse battery staple")]
    fn valid_credentials_trim_username(#[case] username: &str, #[case] password: &str) {
        let creds = LoginCredentials::try_from_parts(username, password)
            .expect("valid inputs should succeed");
        assert_eq!(creds.username(), username.trim());
        assert_eq!(creds.password(), password);
    }

    #[rstest]
    fn debug_output_redacts_passwords() {
        let creds = LoginCredentials::try_from_parts("alice", "hunter22").expect("valid");
        let registration =
            Registration::try_from_parts("Ada", "ada@example.com", "analytical").expect("valid");
        assert!(!format!("{creds:?}").contains("hunter22"));
        assert!(!format!("{registration:?}").contains("analytical"));
    }

    #[rstest]
    #[case("", "a@b.io", "longenough", RegistrationValidationError::EmptyName)]
    #[case("Ada", "not-an-email", "longenough", RegistrationValidationError::InvalidEmail)]
    #[case("Ada", "@b.io", "longenough", RegistrationValidationError::InvalidEmail)]
    #[case("Ada", "a@b.io", "short", RegistrationValidationError::PasswordTooShort { min: 8 })]
    fn invalid_registration(
        #[case] name: &str,
        #[case] email: &str,
        #[case] password: &str,
        #[case] expected: RegistrationValidationError,
    ) {
        assert_eq!(
            Registration::try_from_parts(name, email, password),
            Err(expected)
        );
    }

    struct Harness {
        service: AuthService,
        clock: Arc<MutableClock>,
    }

    fn harness(transport: MockUpstreamTransport) -> Harness {
        let start = Utc
            .with_ymd_and_hms(2026, 2, 14, 10, 0, 0)
            .single()
            .expect("valid fixture time");
        let clock = Arc::new(MutableClock::new(start));
        let limiter = RateLimiter::in_memory(EvictionPolicy::default(), clock.clone());
        let gateway = Arc::new(GatewayClient::new(Arc::new(transport), limiter));
        let secret = SessionSecret::from_bytes(vec![b'k'; 32]).expect("fixture secret");
        let sessions = SessionManager::new(SessionCodec::new(&secret, clock.clone()), true);
        Harness {
            service: AuthService::new(gateway, sessions),
            clock,
        }
    }

    fn auth_ok() -> UpstreamResponse {
        UpstreamResponse::json(
            200,
            &serde_json::json!({
                "success": true,
                "message": "welcome",
                "data": { "user": { "id": "u-9", "role": "admin" }, "token": "upstream-jwt" }
            }),
        )
    }

    #[fixture]
    fn credentials() -> LoginCredentials {
        LoginCredentials::try_from_parts("Alice", "hunter22").expect("fixture credentials")
    }

    #[rstest]
    #[tokio::test]
    async fn login_issues_session_cookie(credentials: LoginCredentials) {
        let mut transport = MockUpstreamTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                request.path == LOGIN_PATH
                    && request.body
                        == Some(serde_json::json!({ "username": "Alice", "password": "hunter22" }))
            })
            .times(1)
            .returning(|_| Ok(auth_ok()));
        let Harness { service, .. } = harness(transport);
        let mut jar = MemoryCookieJar::new();

        let result = service
            .login(&mut jar, &credentials)
            .await
            .expect("no fatal error");

        let session = result.data().expect("session issued");
        assert_eq!(session.claims.user_id(), "u-9");
        assert_eq!(session.claims.role(), "admin");
        assert_eq!(session.claims.token(), "upstream-jwt");
        assert!(jar.cookie(SESSION_COOKIE_NAME).is_some());
        assert_eq!(service.current_session(&jar).as_ref(), Some(session));
    }

    #[rstest]
    #[tokio::test]
    async fn rejected_login_leaves_jar_empty(credentials: LoginCredentials) {
        let mut transport = MockUpstreamTransport::new();
        transport.expect_send().returning(|_| {
            Ok(UpstreamResponse::json(
                401,
                &serde_json::json!({
                    "success": false,
                    "message": "Invalid credentials",
                    "error": "UNAUTHORIZED",
                    "details": []
                }),
            ))
        });
        let Harness { service, .. } = harness(transport);
        let mut jar = MemoryCookieJar::new();

        let result = service
            .login(&mut jar, &credentials)
            .await
            .expect("no fatal error");

        assert_eq!(result.status(), 401);
        assert_eq!(result.message(), Some("Invalid credentials"));
        assert!(jar.cookie(SESSION_COOKIE_NAME).is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn repeated_login_is_throttled_per_username(credentials: LoginCredentials) {
        let mut transport = MockUpstreamTransport::new();
        transport.expect_send().times(2).returning(|_| Ok(auth_ok()));
        let Harness { service, clock } = harness(transport);
        let mut jar = MemoryCookieJar::new();
        let shouting = LoginCredentials::try_from_parts("ALICE", "hunter22").expect("credentials");

        assert!(service.login(&mut jar, &credentials).await.expect("first").is_ok());
        clock.advance(Duration::from_millis(1_500));
        let throttled = service.login(&mut jar, &shouting).await.expect("second");
        assert_eq!(throttled.status(), 429, "usernames normalise to one identity");

        clock.advance(Duration::from_millis(500));
        assert!(service.login(&mut jar, &credentials).await.expect("third").is_ok());
    }

    #[rstest]
    #[tokio::test]
    async fn blank_upstream_token_is_a_validation_failure(credentials: LoginCredentials) {
        let mut transport = MockUpstreamTransport::new();
        transport.expect_send().returning(|_| {
            Ok(UpstreamResponse::json(
                200,
                &serde_json::json!({
                    "success": true,
                    "message": "welcome",
                    "data": { "user": { "id": "u-9", "role": "admin" }, "token": "" }
                }),
            ))
        });
        let Harness { service, .. } = harness(transport);
        let mut jar = MemoryCookieJar::new();

        let result = service
            .login(&mut jar, &credentials)
            .await
            .expect("no fatal error");

        assert_eq!(result.message(), Some("invalid data payload"));
        assert!(jar.cookie(SESSION_COOKIE_NAME).is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn signup_posts_registration_and_opens_session() {
        let mut transport = MockUpstreamTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                request.path == REGISTER_PATH
                    && request
                        .body
                        .as_ref()
                        .and_then(|body| body.get("email"))
                        .and_then(serde_json::Value::as_str)
                        == Some("ada@example.com")
            })
            .times(1)
            .returning(|_| Ok(auth_ok()));
        let Harness { service, .. } = harness(transport);
        let mut jar = MemoryCookieJar::new();
        let registration = Registration::try_from_parts("Ada", " Ada@Example.com ", "analytical")
            .expect("registration");

        let result = service
            .signup(&mut jar, &registration)
            .await
            .expect("no fatal error");

        assert!(result.is_ok());
        assert!(service.current_session(&jar).is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn logout_clears_the_session(credentials: LoginCredentials) {
        let mut transport = MockUpstreamTransport::new();
        transport.expect_send().returning(|_| Ok(auth_ok()));
        let Harness { service, .. } = harness(transport);
        let mut jar = MemoryCookieJar::new();
        service
            .login(&mut jar, &credentials)
            .await
            .expect("no fatal error");

        service.logout(&mut jar);

        assert!(service.current_session(&jar).is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn touch_extends_session(credentials: LoginCredentials) {
        let mut transport = MockUpstreamTransport::new();
        transport.expect_send().returning(|_| Ok(auth_ok()));
        let Harness { service, clock } = harness(transport);
        let mut jar = MemoryCookieJar::new();
        let created = service
            .login(&mut jar, &credentials)
            .await
            .expect("no fatal error")
            .into_result()
            .expect("logged in")
            .data;

        clock.advance_seconds(60);
        let touched = service
            .touch_session(&mut jar)
            .expect("refresh")
            .expect("session present");

        assert!(touched.expires_at > created.expires_at);
    }
}
