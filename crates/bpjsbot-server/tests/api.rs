//! End-to-end tests of the HTTP API against a temporary data directory.
//!
//! Requests go straight into the router with `oneshot`; the hosted models
//! are replaced by scripted ones.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bpjsbot_chat::{ChatModel, CompletionRequest};
use bpjsbot_core::{ChatbotConfig, Error, Result};
use bpjsbot_infer::NoopEmbedder;
use bpjsbot_server::{build_router, AppState, Models};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const SAMPLE_PDF: &[u8] = include_bytes!("../../bpjsbot-ingest/tests/fixtures/panduan.pdf");

struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Every message text of every request, in order.
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .extend(request.messages.into_iter().map(|m| m.content));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Llm("no scripted reply left".into()))
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

struct TestApp {
    dir: TempDir,
    app: Router,
    pdf_model: Arc<ScriptedModel>,
}

fn test_app(sql_replies: &[&str], pdf_replies: &[&str]) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = ChatbotConfig::from_env(dir.path().join("data")).unwrap();
    config.sql_database = config.data_paths.database.clone();
    config.sql_ignore_tables = vec!["userss".into()];
    config.password_iterations = 1_000;

    let pdf_model = ScriptedModel::new(pdf_replies);
    let models = Models {
        sql: ScriptedModel::new(sql_replies),
        pdf: pdf_model.clone(),
    };
    let state = AppState::new(config, Arc::new(NoopEmbedder::new(384)), models).unwrap();

    TestApp {
        dir,
        app: build_router(Arc::new(state)),
        pdf_model,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn post_file(app: &Router, field: &str, filename: &str, content: &[u8]) -> (StatusCode, Value) {
    let boundary = "bpjsbot-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/upload_pdf")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

#[tokio::test]
async fn test_chat_requires_all_fields() {
    let t = test_app(&[], &[]);

    let (status, body) = post_json(&t.app, "/chat", json!({"command": "/sql halo"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Command, username, dan conversation_id wajib dikirim");

    let (status, _) = post_json(
        &t.app,
        "/chat",
        json!({"command": "", "username": "budi", "conversation_id": "c1"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let t = test_app(&[], &[]);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_sql_command_answers_and_records_turn() {
    let t = test_app(&["SQLQuery: SELECT COUNT(*) AS n FROM history;", "Belum ada riwayat."], &[]);

    let (status, body) = post_json(
        &t.app,
        "/chat",
        json!({
            "command": "/sql berapa jumlah riwayat?",
            "username": "budi",
            "conversation_id": "conv-1",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Belum ada riwayat.");

    let (status, messages) = get(&t.app, "/chat/conversation/conv-1").await;
    assert_eq!(status, StatusCode::OK);
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["user"], "budi");
    assert_eq!(messages[0]["bot"], "Belum ada riwayat.");
    assert_eq!(messages[0]["user_question"], "berapa jumlah riwayat?");
}

#[tokio::test]
async fn test_unknown_command_gets_usage() {
    let t = test_app(&[], &[]);

    let (status, body) = post_json(
        &t.app,
        "/chat",
        json!({"command": "halo", "username": "budi", "conversation_id": "c1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["response"].as_str().unwrap().contains("/sql <pertanyaan>"));
}

#[tokio::test]
async fn test_pdf_command_without_document() {
    let t = test_app(&[], &["tidak dipakai"]);

    let (status, body) = post_json(
        &t.app,
        "/chat",
        json!({"command": "/pdf apa itu JKN?", "username": "sari", "conversation_id": "c9"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Dokumen PDF tidak tersedia atau gagal dimuat.");
}

#[tokio::test]
async fn test_history_add_and_list() {
    let t = test_app(&[], &[]);

    let (status, body) = post_json(&t.app, "/history", json!({"user": "budi"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Isi user dan bot wajib diisi.");

    let (status, _) = post_json(&t.app, "/history", json!({"user": "budi", "bot": "halo"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post_json(&t.app, "/history", json!({"user": "sari", "bot": "hai"})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, rows) = get(&t.app, "/history").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    // Newest first
    assert_eq!(rows[0]["user"], "sari");
    assert!(rows[0]["created_at"].is_string());
}

#[tokio::test]
async fn test_user_conversations_grouped() {
    let t = test_app(&[], &[]);

    for (conv, cmd) in [("a", "halo"), ("a", "lagi"), ("b", "apa kabar")] {
        let (status, _) = post_json(
            &t.app,
            "/chat",
            json!({"command": cmd, "username": "budi", "conversation_id": conv}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, list) = get(&t.app, "/history/user/budi").await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);

    let a = list.iter().find(|c| c["conversation_id"] == "a").unwrap();
    assert_eq!(a["first_message_snippet"], "halo");
    assert_eq!(a["user"], "budi");

    let (_, empty) = get(&t.app, "/history/user/orang_lain").await;
    assert_eq!(empty, json!([]));
}

#[tokio::test]
async fn test_admin_history_needs_admin_role() {
    let t = test_app(&[], &[]);
    post_json(&t.app, "/history", json!({"user": "budi", "bot": "halo"})).await;

    let (status, body) = get(&t.app, "/admin/history").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = get(&t.app, "/admin/history?role=pegawai").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get(&t.app, "/admin/history?role=admin").await;
    assert_eq!(status, StatusCode::OK);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["user_id"], "budi");
    assert_eq!(history[0]["role"], "unknown");
    assert_eq!(history[0]["message"], "halo");
}

#[tokio::test]
async fn test_register_and_login() {
    let t = test_app(&[], &[]);

    let (status, _) = post_json(&t.app, "/register", json!({"username": "budi"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &t.app,
        "/register",
        json!({"username": "budi", "password": "rahasia"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Registrasi berhasil!");

    let (status, body) = post_json(
        &t.app,
        "/login",
        json!({"username": "budi", "password": "rahasia"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"], json!({"username": "budi", "role": "pegawai"}));

    let (status, body) = post_json(
        &t.app,
        "/login",
        json!({"username": "budi", "password": "salah"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Username atau password salah");

    let (status, _) = post_json(
        &t.app,
        "/login",
        json!({"username": "tidak_ada", "password": "rahasia"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_with_role_and_duplicate() {
    let t = test_app(&[], &[]);

    let creds = json!({"username": "admin1", "password": "pw", "role": "admin"});
    let (status, _) = post_json(&t.app, "/register", creds.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_json(&t.app, "/register", creds).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (_, body) = post_json(&t.app, "/login", json!({"username": "admin1", "password": "pw"})).await;
    assert_eq!(body["user"]["role"], "admin");
}

#[tokio::test]
async fn test_tables_hide_users() {
    let t = test_app(&[], &[]);

    let (status, body) = get(&t.app, "/tables").await;
    assert_eq!(status, StatusCode::OK);
    let tables: Vec<&str> = body["tables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert!(tables.contains(&"history"));
    assert!(!tables.contains(&"userss"));
    assert!(!tables.contains(&"pdf_pages"));
}

#[tokio::test]
async fn test_upload_rejects_bad_requests() {
    let t = test_app(&[], &[]);

    let (status, body) = post_file(&t.app, "dokumen", "sop.pdf", b"%PDF").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Tidak ada file PDF di request");

    let (status, body) = post_file(&t.app, "file", "", b"%PDF").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Nama file kosong");

    let (status, body) = post_file(&t.app, "file", "catatan.txt", b"halo").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File harus berformat PDF");
}

#[tokio::test]
async fn test_upload_unreadable_pdf_fails() {
    let t = test_app(&[], &[]);

    let (status, body) = post_file(&t.app, "file", "rusak.pdf", b"bukan pdf sama sekali").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Gagal memuat PDF:"));

    let (_, health) = get(&t.app, "/health").await;
    assert_eq!(health["pdfLoaded"], false);
}

#[tokio::test]
async fn test_upload_then_ask_document() {
    let t = test_app(&[], &["Rujukan dimulai dari faskes tingkat pertama."]);

    let (status, body) = post_file(&t.app, "file", "Panduan Peserta.pdf", SAMPLE_PDF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "PDF berhasil diunggah dan dimuat ulang.");
    assert_eq!(body["filename"], "Panduan_Peserta.pdf");
    assert!(t
        .dir
        .path()
        .join("data/uploads/Panduan_Peserta.pdf")
        .is_file());

    let (_, health) = get(&t.app, "/health").await;
    assert_eq!(health["pdfLoaded"], true);
    assert_eq!(health["pages"], 2);
    assert_eq!(health["pdfFilename"], "Panduan_Peserta.pdf");

    let (status, body) = post_json(
        &t.app,
        "/chat",
        json!({
            "command": "/pdf bagaimana prosedur rujukan?",
            "username": "sari",
            "conversation_id": "c-pdf",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Rujukan dimulai dari faskes tingkat pertama.");

    let prompts = t.pdf_model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[Page 0]: "));
    assert!(prompts[0].contains("berjenjang"));
    assert!(!prompts[0].contains("[Page 1]: "));
}

#[tokio::test]
async fn test_health() {
    let t = test_app(&[], &[]);

    let (status, body) = get(&t.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pages"], 0);
    assert_eq!(body["embedderAvailable"], false);
    assert_eq!(body["sqlModel"], "scripted");
}
