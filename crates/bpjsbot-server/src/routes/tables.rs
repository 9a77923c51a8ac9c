//! Tables available to `/sql` questions.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use super::{internal_error, ApiResponse};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tables", get(list_tables))
}

/// GET /tables
async fn list_tables(State(state): State<Arc<AppState>>) -> ApiResponse {
    match state.sql_db.usable_table_names() {
        Ok(tables) => (StatusCode::OK, Json(json!({ "tables": tables }))),
        Err(e) => internal_error(e),
    }
}
