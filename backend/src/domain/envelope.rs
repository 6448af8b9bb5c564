//! Validation of upstream response envelopes.
//!
//! Every upstream body must match exactly one of two wire contracts:
//!
//! - success: `{ success, message, data }`
//! - error: `{ success, message, error, details: [{ field, message }] }`
//!
//! Anything else becomes an [`ApiFailure`] carrying a validation error. This
//! module never panics and never returns `Err`.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::api_result::{ApiFailure, ApiResult, ApiSuccess, FieldDetail};
use super::ports::UpstreamResponse;
use super::schema::{Schema, decode_json};

/// Message for non-2xx bodies that do not match the error envelope.
pub const INVALID_ERROR_PAYLOAD: &str = "invalid error payload";
/// Message for 2xx bodies that do not match the success envelope.
pub const INVALID_SUCCESS_PAYLOAD: &str = "invalid success payload";
/// Message for success envelopes whose `data` fails the payload schema.
pub const INVALID_DATA_PAYLOAD: &str = "invalid data payload";

#[derive(Debug, Deserialize)]
struct SuccessEnvelope {
    success: bool,
    message: String,
    // A missing key reads as `null`; the payload schema decides.
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    success: bool,
    message: String,
    error: String,
    details: Vec<FieldDetail>,
}

/// Normalise one upstream response into an [`ApiResult`].
///
/// # Examples
/// ```
/// use gateway::domain::envelope::parse_envelope;
/// use gateway::domain::ports::UpstreamResponse;
/// use gateway::domain::schema::AnyJson;
/// use serde_json::json;
///
/// let response = UpstreamResponse::json(
///     404,
///     &json!({ "success": false, "message": "Not found", "error": "NOT_FOUND", "details": [] }),
/// );
/// let result = parse_envelope(&response, &AnyJson);
/// let failure = result.failure().expect("404 is a failure");
/// assert_eq!(failure.status(), 404);
/// assert_eq!(failure.message(), "Not found");
/// assert_eq!(failure.backend_error(), Some("NOT_FOUND"));
/// ```
pub fn parse_envelope<T, S>(response: &UpstreamResponse, payload_schema: &S) -> ApiResult<T>
where
    S: Schema<T> + ?Sized,
{
    let status = response.status;
    if !response.is_success() {
        return parse_error_envelope(status, &response.body).into();
    }

    let envelope = match decode_json::<SuccessEnvelope>(&response.body) {
        Ok(envelope) => envelope,
        Err(error) => {
            return ApiFailure::upstream_validation(status, INVALID_SUCCESS_PAYLOAD, error).into();
        }
    };
    if !envelope.success {
        debug!(status, "success status carried an envelope with success=false");
    }

    match payload_schema.validate(&envelope.data) {
        Ok(data) => ApiResult::Success(ApiSuccess {
            status,
            message: Some(envelope.message),
            data,
        }),
        Err(error) => ApiFailure::upstream_validation(status, INVALID_DATA_PAYLOAD, error).into(),
    }
}

fn parse_error_envelope(status: u16, body: &[u8]) -> ApiFailure {
    match decode_json::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            if envelope.success {
                debug!(status, "failure status carried an envelope with success=true");
            }
            ApiFailure::backend(status, envelope.message, envelope.error, envelope.details)
        }
        Err(error) => ApiFailure::upstream_validation(status, INVALID_ERROR_PAYLOAD, error),
    }
}
