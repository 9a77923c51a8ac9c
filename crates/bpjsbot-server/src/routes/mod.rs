//! HTTP route handlers.
//!
//! Every failure is answered with a JSON `{"error": ...}` body: 500 for
//! internal failures, 400/401/403 for rejected requests.

pub mod auth;
pub mod chat;
pub mod health;
pub mod history;
pub mod tables;
pub mod upload;

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::state::AppState;

/// Largest accepted request body (PDF uploads).
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Status code plus JSON body, the shape every handler returns.
pub type ApiResponse = (StatusCode, Json<Value>);

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(chat::routes())
        .merge(history::routes())
        .merge(auth::routes())
        .merge(tables::routes())
        .merge(upload::routes())
        .merge(health::routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (status, Json(json!({ "error": message.into() })))
}

pub(crate) fn internal_error(e: impl Display) -> ApiResponse {
    error!("Request failed: {}", e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// The parsed body, or a 400 when it is missing or malformed.
pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiResponse> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| error_response(StatusCode::BAD_REQUEST, rejection.body_text()))
}

/// Treat blank strings like missing ones.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
