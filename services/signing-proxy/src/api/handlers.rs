//! HTTP handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::api::dto::{SignResponseBody, StartSigningBody, StatusQuery};
use crate::api::error::{ApiError, ApiErrorKind};
use crate::api::{AppState, CorrelationId};
use crate::gateway::SignInitiateResult;

/// POST /api/signing
pub async fn start_signing(
    State(state): State<AppState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    body: Result<Json<StartSigningBody>, JsonRejection>,
) -> Result<Json<SignInitiateResult>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError {
                correlation_id,
                kind: ApiErrorKind::PayloadTooLarge,
            }
        } else {
            ApiError::validation(correlation_id, rejection.body_text())
        }
    })?;

    let request = body
        .into_request()
        .map_err(|message| ApiError::validation(correlation_id, message))?;

    let result = state
        .client
        .start_signing_process(&request)
        .await
        .map_err(|e| ApiError::signing(correlation_id, e))?;

    Ok(Json(result))
}

/// GET /api/signing/{id}
pub async fn sign_status(
    State(state): State<AppState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    Path(request_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<SignResponseBody>, ApiError> {
    if request_id.trim().is_empty() {
        return Err(ApiError::validation(correlation_id, "request id is required"));
    }

    let language = query
        .language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.default_language.to_string());

    let response = state
        .client
        .get_sign_response(&request_id, &language)
        .await
        .map_err(|e| ApiError::signing(correlation_id, e))?;

    Ok(Json(response.into()))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
