//! PDF upload: save the file and rebuild the page index from it.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bpjsbot_ingest::{allowed_file, secure_filename};
use serde_json::json;
use tracing::{info, warn};

use super::{error_response, ApiResponse};
use crate::state::AppState;

/// Multipart field carrying the document.
const FILE_FIELD: &str = "file";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/upload_pdf", post(upload_pdf))
}

/// POST /upload_pdf: multipart field `file`.
async fn upload_pdf(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> ApiResponse {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // A part without a filename counts as an empty selection
        let filename = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => {
                upload = Some((filename, bytes.to_vec()));
                break;
            }
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        }
    }

    let (original_name, bytes) = match upload {
        Some(u) => u,
        None => return error_response(StatusCode::BAD_REQUEST, "Tidak ada file PDF di request"),
    };
    if original_name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Nama file kosong");
    }
    if !allowed_file(&original_name) {
        return error_response(StatusCode::BAD_REQUEST, "File harus berformat PDF");
    }
    let filename = secure_filename(&original_name);
    if filename.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Nama file kosong");
    }

    let path = state.config.data_paths.uploads.join(&filename);
    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        return load_failure(e);
    }
    info!("Saved upload {} ({} bytes)", filename, bytes.len());

    let _guard = state.upload_lock.lock().await;
    let indexer = state.indexer.clone();
    let index_path = path.clone();
    match tokio::task::spawn_blocking(move || indexer.index_file(&index_path)).await {
        Ok(Ok(report)) => {
            info!(
                "Reloaded PDF {}: {} pages, {} embedded",
                report.filename, report.pages, report.embedded
            );
            (
                StatusCode::OK,
                Json(json!({
                    "message": "PDF berhasil diunggah dan dimuat ulang.",
                    "filename": filename,
                })),
            )
        }
        Ok(Err(e)) => load_failure(e),
        Err(e) => load_failure(e),
    }
}

fn load_failure(e: impl std::fmt::Display) -> ApiResponse {
    warn!("PDF upload failed: {}", e);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Gagal memuat PDF: {}", e),
    )
}
