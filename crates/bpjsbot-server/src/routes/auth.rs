//! Account registration and login.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bpjsbot_core::password::{check_password_hash, hash_with_iterations};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{error_response, internal_error, parse_body, present, ApiResponse};
use crate::state::AppState;

/// Role given to accounts registered without one.
pub const DEFAULT_ROLE: &str = "pegawai";

const MISSING_CREDENTIALS: &str = "Username dan password wajib diisi";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

/// POST /register
async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResponse {
    let req = match parse_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let (username, password) = match (present(req.username), present(req.password)) {
        (Some(u), Some(p)) => (u, p),
        _ => return error_response(StatusCode::BAD_REQUEST, MISSING_CREDENTIALS),
    };
    let role = present(req.role).unwrap_or_else(|| DEFAULT_ROLE.to_string());

    // Key stretching takes a noticeable fraction of a second
    let iterations = state.config.password_iterations;
    let hashed = match tokio::task::spawn_blocking(move || hash_with_iterations(&password, iterations))
        .await
    {
        Ok(h) => h,
        Err(e) => return internal_error(e),
    };

    match state.store.create_user(&username, &hashed, &role) {
        Ok(_) => {
            info!("Registered {} as {}", username, role);
            (
                StatusCode::CREATED,
                Json(json!({ "message": "Registrasi berhasil!" })),
            )
        }
        Err(e) => internal_error(e),
    }
}

/// POST /login
async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResponse {
    let req = match parse_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let (username, password) = match (present(req.username), present(req.password)) {
        (Some(u), Some(p)) => (u, p),
        _ => return error_response(StatusCode::BAD_REQUEST, MISSING_CREDENTIALS),
    };

    let user = match state.store.find_user(&username) {
        Ok(user) => user,
        Err(e) => return internal_error(e),
    };
    let user = match user {
        Some(user) => user,
        None => {
            return error_response(StatusCode::UNAUTHORIZED, "Username atau password salah")
        }
    };

    let stored = user.password_hash.clone();
    let valid = match tokio::task::spawn_blocking(move || check_password_hash(&stored, &password))
        .await
    {
        Ok(valid) => valid,
        Err(e) => return internal_error(e),
    };
    if !valid {
        return error_response(StatusCode::UNAUTHORIZED, "Username atau password salah");
    }

    (
        StatusCode::OK,
        Json(json!({
            "message": "Login berhasil",
            "user": { "username": user.username, "role": user.role },
        })),
    )
}
