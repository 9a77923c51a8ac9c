//! Chat routes: answering commands and reading back a conversation.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bpjsbot_runtime::Command;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{error_response, internal_error, parse_body, present, ApiResponse};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/conversation/{conversation_id}", get(conversation))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    command: Option<String>,
    username: Option<String>,
    conversation_id: Option<String>,
}

/// POST /chat: answer a command and record the turn.
async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResponse {
    let req = match parse_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let (command, username, conversation_id) = match (
        present(req.command),
        present(req.username),
        present(req.conversation_id),
    ) {
        (Some(c), Some(u), Some(id)) => (c, u, id),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Command, username, dan conversation_id wajib dikirim",
            )
        }
    };

    let command = Command::parse(&command);
    let response = state.router.answer(&command, Some(&conversation_id)).await;

    if let Err(e) = state.store.add_chat_turn(
        &username,
        &response,
        Some(&conversation_id),
        Some(command.user_question()),
    ) {
        return internal_error(e);
    }

    info!("Answered {} for {} in {}", command.kind(), username, conversation_id);
    (StatusCode::OK, Json(json!({ "response": response })))
}

/// GET /chat/conversation/{conversation_id}: all messages, oldest first.
async fn conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> ApiResponse {
    match state.store.conversation_messages(&conversation_id) {
        Ok(rows) => {
            let messages: Vec<_> = rows
                .into_iter()
                .map(|r| {
                    json!({
                        "user": r.user,
                        "bot": r.bot,
                        "user_question": r.user_question,
                        "created_at": r.created_at,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!(messages)))
        }
        Err(e) => internal_error(e),
    }
}
