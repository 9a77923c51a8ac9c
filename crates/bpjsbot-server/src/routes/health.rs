//! Liveness and index status.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let pages = state.store.count_pages().unwrap_or(0);
    let document = state.store.indexed_filename().ok().flatten();

    Json(json!({
        "status": "ok",
        "pdfLoaded": pages > 0,
        "pdfFilename": document,
        "pages": pages,
        "embedderAvailable": state.embedder.is_available(),
        "sqlModel": state.router.sql().model().describe(),
        "pdfModel": state.router.pdf().model().describe(),
    }))
}
