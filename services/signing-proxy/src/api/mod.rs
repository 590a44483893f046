//! HTTP API in front of the signing client.

pub mod dto;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::client::SigningClient;

pub use error::{ApiError, ApiErrorKind};

/// Response header carrying the correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Signing client shared by all requests
    pub client: Arc<SigningClient>,
    /// Language for status queries without one
    pub default_language: Arc<str>,
    /// Request body limit in bytes
    pub max_request_bytes: usize,
}

impl AppState {
    /// Creates handler state.
    #[must_use]
    pub fn new(
        client: Arc<SigningClient>,
        default_language: impl Into<Arc<str>>,
        max_request_bytes: usize,
    ) -> Self {
        Self {
            client,
            default_language: default_language.into(),
            max_request_bytes,
        }
    }
}

/// Per-request correlation id.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_request_bytes;

    Router::new()
        .route("/api/signing", post(handlers::start_signing))
        .route("/api/signing/:id", get(handlers::sign_status))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(correlate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn correlate(mut request: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    request.extensions_mut().insert(CorrelationId(id));

    let span = info_span!(
        "request",
        correlation_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
