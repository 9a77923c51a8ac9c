//! History routes: the raw log, per-user conversation lists and the
//! admin view.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::{error_response, internal_error, parse_body, present, ApiResponse};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/history", get(list_history).post(add_history))
        .route("/history/user/{username}", get(user_conversations))
        .route("/admin/history", get(admin_history))
}

/// GET /history: every turn, newest first.
async fn list_history(State(state): State<Arc<AppState>>) -> ApiResponse {
    match state.store.list_history() {
        Ok(rows) => {
            let rows: Vec<_> = rows
                .into_iter()
                .map(|r| json!({ "user": r.user, "bot": r.bot, "created_at": r.created_at }))
                .collect();
            (StatusCode::OK, Json(json!(rows)))
        }
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct NewHistory {
    user: Option<String>,
    bot: Option<String>,
}

/// POST /history: store a bare turn without conversation.
async fn add_history(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewHistory>, JsonRejection>,
) -> ApiResponse {
    let req = match parse_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let (user, bot) = match (present(req.user), present(req.bot)) {
        (Some(u), Some(b)) => (u, b),
        _ => return error_response(StatusCode::BAD_REQUEST, "Isi user dan bot wajib diisi."),
    };

    match state.store.add_chat_turn(&user, &bot, None, None) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({ "message": "Riwayat berhasil disimpan." })),
        ),
        Err(e) => internal_error(e),
    }
}

/// GET /history/user/{username}: one entry per conversation.
async fn user_conversations(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResponse {
    match state.store.user_conversations(&username) {
        Ok(conversations) => (StatusCode::OK, Json(json!(conversations))),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct AdminQuery {
    role: Option<String>,
}

/// GET /admin/history?role=admin: full log for administrators.
async fn admin_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminQuery>,
) -> ApiResponse {
    if query.role.as_deref() != Some("admin") {
        return error_response(StatusCode::FORBIDDEN, "Unauthorized");
    }

    match state.store.list_history() {
        Ok(rows) => {
            let history: Vec<_> = rows
                .into_iter()
                .map(|r| {
                    json!({
                        "user_id": r.user,
                        "role": "unknown",
                        "message": r.bot,
                        "timestamp": r.created_at,
                        "conversation_id": r.conversation_id,
                        "user_question": r.user_question,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "history": history })))
        }
        Err(e) => internal_error(e),
    }
}
