//! HTTP error responses
//!
//! Every error body carries the correlation id of the request.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::SigningError;

/// What went wrong while serving a request.
#[derive(Debug)]
pub enum ApiErrorKind {
    /// The request body or parameters are invalid
    Validation(String),
    /// The request body exceeds the size limit
    PayloadTooLarge,
    /// The signing client failed
    Signing(SigningError),
}

/// Error returned by the HTTP handlers.
#[derive(Debug)]
pub struct ApiError {
    /// Correlation id of the failed request
    pub correlation_id: Uuid,
    /// Failure
    pub kind: ApiErrorKind,
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable error code
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// Correlation id for tracing
    pub correlation_id: Uuid,
}

impl ApiError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(correlation_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            correlation_id,
            kind: ApiErrorKind::Validation(message.into()),
        }
    }

    /// Wraps a signing client error.
    #[must_use]
    pub const fn signing(correlation_id: Uuid, error: SigningError) -> Self {
        Self {
            correlation_id,
            kind: ApiErrorKind::Signing(error),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.kind {
            ApiErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
            ApiErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiErrorKind::Signing(e) => match e {
                SigningError::ServiceUnavailable { .. } | SigningError::Disposed => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                SigningError::Communication(_) => StatusCode::BAD_GATEWAY,
                SigningError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        let (code, message) = match &self.kind {
            ApiErrorKind::Validation(message) => ("VALIDATION_ERROR", message.clone()),
            ApiErrorKind::PayloadTooLarge => (
                "PAYLOAD_TOO_LARGE",
                "Request body exceeds the size limit".to_string(),
            ),
            ApiErrorKind::Signing(e) if e.is_startup_error() => (
                e.code().as_str(),
                "Signing client is misconfigured".to_string(),
            ),
            ApiErrorKind::Signing(e) => (e.code().as_str(), e.to_string()),
        };
        ErrorBody {
            code,
            message,
            correlation_id: self.correlation_id,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();

        if status.is_server_error() {
            error!(
                correlation_id = %self.correlation_id,
                code = body.code,
                error = %body.message,
                "Request failed"
            );
        } else {
            warn!(
                correlation_id = %self.correlation_id,
                code = body.code,
                error = %body.message,
                "Request rejected"
            );
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;

    fn status_of(error: SigningError) -> StatusCode {
        ApiError::signing(Uuid::new_v4(), error).status()
    }

    #[test]
    fn test_signing_error_statuses() {
        assert_eq!(
            status_of(SigningError::ServiceUnavailable {
                attempts: 4,
                source: GatewayError::timeout("t"),
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(SigningError::Disposed), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(SigningError::Communication(GatewayError::protocol("p"))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(SigningError::Rejected(GatewayError::malformed("m"))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(SigningError::missing_setting("CERT_PATH")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_startup_error_message_is_generic() {
        let error = ApiError::signing(
            Uuid::new_v4(),
            SigningError::CertificateLoad {
                path: "/secret/location.pem".into(),
                reason: "bad".to_string(),
            },
        );
        let body = error.body();
        assert_eq!(body.code, "CERTIFICATE_LOAD_ERROR");
        assert!(!body.message.contains("/secret"));
    }

    #[test]
    fn test_validation_body() {
        let id = Uuid::new_v4();
        let body = ApiError::validation(id, "fileName is required").body();
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.correlation_id, id);
    }
}
