//! Discriminated result returned by every gateway call.
//!
//! Every expected failure (rate limiting, timeouts, validation problems and
//! backend-reported errors) is a value of [`ApiResult`]; only genuinely
//! unexpected infrastructure failures escape as `Err` from the gateway.
//!
//! The wire form, consumed by the presentation layer, is
//! `{ "ok": true, "status", "message"?, "data" }` or
//! `{ "ok": false, "status", "message", "backendError"?, "details"?,
//! "validationError"? }`.

use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use super::schema::ValidationError;

/// Status reported for local input validation failures.
pub const STATUS_BAD_REQUEST: u16 = 400;
/// Status reported when the dispatch deadline elapsed.
pub const STATUS_REQUEST_TIMEOUT: u16 = 408;
/// Status reported when the rate limiter rejected the call.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Message returned for rate-limited calls.
pub const MESSAGE_TOO_MANY_REQUESTS: &str = "too many requests";
/// Message returned for timed-out calls.
pub const MESSAGE_REQUEST_TIMED_OUT: &str = "request timed out";
/// Message returned for local input validation failures.
pub const MESSAGE_INVALID_DATA: &str = "invalid data";

/// Per-field problem reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDetail {
    /// Name of the offending field.
    pub field: String,
    /// Backend-supplied description.
    pub message: String,
}

/// Why a call failed.
///
/// Each variant maps to one message class in the presentation layer. The
/// enum makes it impossible to carry both a backend error and a validation
/// error for the same failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// The request body failed the caller's input schema; nothing was sent.
    LocalValidation(ValidationError),
    /// The rate limiter rejected the call; nothing was sent.
    RateLimited {
        /// Time until the identity's window reopens.
        retry_after: Duration,
    },
    /// The deadline elapsed before the upstream answered. The outcome of the
    /// remote operation is unknown.
    Timeout,
    /// The upstream answered with a body that broke the envelope or payload
    /// contract.
    UpstreamValidation(ValidationError),
    /// The upstream answered with a well-formed error envelope.
    Backend {
        /// Machine-readable error code from the envelope.
        error: String,
        /// Per-field details from the envelope.
        details: Vec<FieldDetail>,
    },
}

/// Successful call outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSuccess<T> {
    /// Upstream HTTP status.
    pub status: u16,
    /// Envelope message, when one was supplied.
    pub message: Option<String>,
    /// Payload validated against the caller's schema.
    pub data: T,
}

/// Failed call outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    status: u16,
    message: String,
    kind: FailureKind,
}

impl ApiFailure {
    /// The rate limiter rejected the call.
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self {
            status: STATUS_TOO_MANY_REQUESTS,
            message: MESSAGE_TOO_MANY_REQUESTS.to_owned(),
            kind: FailureKind::RateLimited { retry_after },
        }
    }

    /// The dispatch deadline elapsed.
    pub fn timeout() -> Self {
        Self {
            status: STATUS_REQUEST_TIMEOUT,
            message: MESSAGE_REQUEST_TIMED_OUT.to_owned(),
            kind: FailureKind::Timeout,
        }
    }

    /// The request body failed local validation.
    pub fn local_validation(error: ValidationError) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            message: MESSAGE_INVALID_DATA.to_owned(),
            kind: FailureKind::LocalValidation(error),
        }
    }

    /// The upstream response broke a contract.
    pub fn upstream_validation(
        status: u16,
        message: impl Into<String>,
        error: ValidationError,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            kind: FailureKind::UpstreamValidation(error),
        }
    }

    /// The upstream reported an error through a well-formed envelope.
    pub fn backend(
        status: u16,
        message: impl Into<String>,
        error: impl Into<String>,
        details: Vec<FieldDetail>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            kind: FailureKind::Backend {
                error: error.into(),
                details,
            },
        }
    }

    /// HTTP-style status describing the failure.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// User-facing message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Failure category.
    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    /// Backend error code, for [`FailureKind::Backend`].
    pub fn backend_error(&self) -> Option<&str> {
        match &self.kind {
            FailureKind::Backend { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }

    /// Backend field details, for [`FailureKind::Backend`].
    pub fn details(&self) -> Option<&[FieldDetail]> {
        match &self.kind {
            FailureKind::Backend { details, .. } => Some(details.as_slice()),
            _ => None,
        }
    }

    /// Validation detail, for local or upstream validation failures.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match &self.kind {
            FailureKind::LocalValidation(error) | FailureKind::UpstreamValidation(error) => {
                Some(error)
            }
            _ => None,
        }
    }
}

/// Outcome of one gateway call.
///
/// # Examples
/// ```
/// use gateway::domain::api_result::{ApiFailure, ApiResult, ApiSuccess};
/// use std::time::Duration;
///
/// let ok: ApiResult<u32> = ApiResult::Success(ApiSuccess {
///     status: 200,
///     message: None,
///     data: 7,
/// });
/// assert_eq!(ok.data(), Some(&7));
///
/// let limited: ApiResult<u32> =
///     ApiResult::Failure(ApiFailure::rate_limited(Duration::from_millis(300)));
/// assert_eq!(limited.status(), 429);
/// assert!(limited.data().is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    /// The call succeeded and the payload passed validation.
    Success(ApiSuccess<T>),
    /// The call failed in an expected way.
    Failure(ApiFailure),
}

impl<T> ApiResult<T> {
    /// Whether this is a success.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Status of the outcome.
    pub fn status(&self) -> u16 {
        match self {
            Self::Success(success) => success.status,
            Self::Failure(failure) => failure.status,
        }
    }

    /// Message of the outcome, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(success) => success.message.as_deref(),
            Self::Failure(failure) => Some(failure.message()),
        }
    }

    /// Payload, present iff this is a success.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(success) => Some(&success.data),
            Self::Failure(_) => None,
        }
    }

    /// Failure detail, present iff this is a failure.
    pub fn failure(&self) -> Option<&ApiFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Transform the payload of a success.
    pub fn map<U, F>(self, f: F) -> ApiResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success(ApiSuccess {
                status,
                message,
                data,
            }) => ApiResult::Success(ApiSuccess {
                status,
                message,
                data: f(data),
            }),
            Self::Failure(failure) => ApiResult::Failure(failure),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<ApiSuccess<T>, ApiFailure> {
        match self {
            Self::Success(success) => Ok(success),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl<T> From<ApiFailure> for ApiResult<T> {
    fn from(failure: ApiFailure) -> Self {
        Self::Failure(failure)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiResultWire<'a, T> {
    ok: bool,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend_error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [FieldDetail]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_error: Option<&'a ValidationError>,
}

impl<'a, T> From<&'a ApiResult<T>> for ApiResultWire<'a, T> {
    fn from(result: &'a ApiResult<T>) -> Self {
        match result {
            ApiResult::Success(success) => Self {
                ok: true,
                status: success.status,
                message: success.message.as_deref(),
                data: Some(&success.data),
                backend_error: None,
                details: None,
                validation_error: None,
            },
            ApiResult::Failure(failure) => Self {
                ok: false,
                status: failure.status,
                message: Some(failure.message()),
                data: None,
                backend_error: failure.backend_error(),
                details: failure.details(),
                validation_error: failure.validation_error(),
            },
        }
    }
}

impl<T: Serialize> Serialize for ApiResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ApiResultWire::from(self).serialize(serializer)
    }
}
