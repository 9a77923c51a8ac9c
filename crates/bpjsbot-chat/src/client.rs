//! The `ChatModel` seam used by the answer pipelines.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::providers::{collect_stream, stream_chat};
use crate::types::{CompletionRequest, ModelSettings};
use bpjsbot_core::{Error, Result};

/// A model that turns a prompt into a full response text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// `provider/model`, for logs and status.
    fn describe(&self) -> String;

    fn is_configured(&self) -> bool {
        true
    }
}

/// A hosted model reached over HTTP.
///
/// Each attempt is bounded by the settings' timeout; failed attempts are
/// retried with exponential backoff.
pub struct HttpChatModel {
    client: Client,
    settings: ModelSettings,
}

impl HttpChatModel {
    pub fn new(client: Client, settings: ModelSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    async fn attempt(&self, request: CompletionRequest) -> Result<String> {
        let stream = stream_chat(&self.client, &self.settings, request);
        match tokio::time::timeout(self.settings.timeout, collect_stream(stream)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Error::Llm(e)),
            Err(_) => Err(Error::Llm(format!(
                "Request timed out after {}s",
                self.settings.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            match self.attempt(request.clone()).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.settings.max_retries => {
                    let backoff = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "{} attempt {} failed: {}. Retrying in {:?}",
                        self.describe(),
                        attempt + 1,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!("{} gave up after {} attempts", self.describe(), attempt + 1);
                    return Err(e);
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.settings.provider, self.settings.model)
    }
}

/// Stand-in when no API key is configured. Every call fails with a
/// message naming the missing key.
pub struct UnconfiguredModel {
    missing_key: String,
}

impl UnconfiguredModel {
    pub fn new(missing_key: impl Into<String>) -> Self {
        Self {
            missing_key: missing_key.into(),
        }
    }
}

#[async_trait]
impl ChatModel for UnconfiguredModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Err(Error::Llm(format!("{} is not set", self.missing_key)))
    }

    fn describe(&self) -> String {
        "unconfigured".to_string()
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, LLMProvider};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned SSE response and hand back the raw request. Each
    /// part of the body is written separately with a pause in between.
    async fn one_shot_server(parts: Vec<Vec<u8>>) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let l = l.to_ascii_lowercase();
                            l.strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            for part in parts {
                socket.write_all(&part).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{}/api/v1", addr), handle)
    }

    #[tokio::test]
    async fn test_http_model_collects_stream() {
        let body = concat!(
            ": OPENROUTER PROCESSING\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Rujukan \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"berjenjang.\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let (base_url, server) = one_shot_server(vec![body.as_bytes().to_vec()]).await;

        let mut settings = ModelSettings::new(LLMProvider::OpenRouter, "deepseek/test", "or-key");
        settings.base_url = base_url;
        settings.headers = vec![("X-Title".into(), "BPJS Chatbot".into())];
        let model = HttpChatModel::new(Client::new(), settings);

        let answer = model
            .complete(CompletionRequest::new(vec![ChatMessage::user("apa itu rujukan?")]))
            .await
            .unwrap();
        assert_eq!(answer, "Rujukan berjenjang.");

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("post /api/v1/chat/completions"));
        assert!(request.contains("authorization: bearer or-key"));
        assert!(request.contains("x-title: bpjs chatbot"));
        assert!(request.contains("\"stream\":true"));
    }

    #[tokio::test]
    async fn test_character_split_across_reads() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Rp 10.000 \u{2013} iuran\"}}]}\n\ndata: [DONE]\n\n";
        let cut = body.find('\u{2013}').unwrap() + 1;
        let parts = vec![body.as_bytes()[..cut].to_vec(), body.as_bytes()[cut..].to_vec()];
        let (base_url, server) = one_shot_server(parts).await;

        let mut settings = ModelSettings::new(LLMProvider::Groq, "llama", "gsk-key");
        settings.base_url = base_url;
        let model = HttpChatModel::new(Client::new(), settings);

        let answer = model.complete(CompletionRequest::prompt("iuran?")).await.unwrap();
        assert_eq!(answer, "Rp 10.000 \u{2013} iuran");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_after_retries() {
        let mut settings = ModelSettings::new(LLMProvider::Groq, "m", "k");
        // Port 9 (discard) is closed on test machines
        settings.base_url = "http://127.0.0.1:9/v1".into();
        settings.max_retries = 1;
        settings.timeout = Duration::from_secs(2);
        let model = HttpChatModel::new(Client::new(), settings);

        let err = model.complete(CompletionRequest::prompt("q")).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_model() {
        let model = UnconfiguredModel::new("GROQ_API_KEY");
        assert!(!model.is_configured());
        let err = model.complete(CompletionRequest::prompt("q")).await.unwrap_err();
        assert_eq!(err.to_string(), "LLM error: GROQ_API_KEY is not set");
    }
}
