//! Streaming client for OpenAI-compatible chat completion APIs.
//!
//! Groq, OpenRouter and OpenAI all stream the same SSE format, so one
//! implementation serves every provider.

use std::pin::Pin;

use futures::Stream;
use reqwest::Client;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::types::{CompletionRequest, ModelSettings};

/// Boxed stream type returned to callers.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed token or error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(String),
}

/// What one SSE line carries.
#[derive(Debug, PartialEq)]
pub(crate) enum SseLine {
    Token(String),
    Done,
    Error(String),
    Skip,
}

pub(crate) fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let data = match line.strip_prefix("data:") {
        Some(d) => d.trim(),
        None => return SseLine::Skip,
    };
    if data == "[DONE]" {
        return SseLine::Done;
    }
    let parsed: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return SseLine::Skip,
    };
    // OpenRouter reports upstream failures mid-stream
    if let Some(msg) = parsed["error"]["message"].as_str() {
        return SseLine::Error(msg.to_string());
    }
    match parsed["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => SseLine::Token(content.to_string()),
        _ => SseLine::Skip,
    }
}

/// Stream tokens for `request` from the model described by `settings`.
pub fn stream_chat(
    client: &Client,
    settings: &ModelSettings,
    request: CompletionRequest,
) -> BoxedStream {
    Box::pin(stream_openai_compat(client.clone(), settings.clone(), request))
}

fn request_body(settings: &ModelSettings, request: &CompletionRequest) -> serde_json::Value {
    let msgs: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();

    let mut body = json!({
        "model": settings.model,
        "messages": msgs,
        "stream": true,
    });
    if let Some(t) = settings.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(n) = settings.max_tokens {
        body["max_tokens"] = json!(n);
    }
    if !request.stop.is_empty() {
        body["stop"] = json!(request.stop);
    }
    body
}

fn stream_openai_compat(
    client: Client,
    settings: ModelSettings,
    request: CompletionRequest,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    let url = settings.chat_url();
    let body = request_body(&settings, &request);

    async_stream::stream! {
        debug!("Streaming from {} with model {}", url, settings.model);

        let mut builder = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", settings.api_key))
            .header("Content-Type", "application/json");
        for (name, value) in &settings.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match builder.json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(format!("Request failed: {}", e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            yield StreamChunk::Error(format!("API error {}: {}", status, body));
            return;
        }

        let mut stream = response.bytes_stream();
        let mut buffer = LineBuffer::default();
        let mut token_count = 0usize;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamChunk::Error(format!("Stream read error: {}", e));
                    return;
                }
            };

            buffer.extend(&bytes);

            while let Some(line) = buffer.next_line() {
                match parse_sse_line(&line) {
                    SseLine::Token(content) => {
                        token_count += 1;
                        yield StreamChunk::Token(content);
                    }
                    SseLine::Done => {
                        yield StreamChunk::Done { tokens_used: token_count };
                        return;
                    }
                    SseLine::Error(msg) => {
                        yield StreamChunk::Error(msg);
                        return;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    }
}

/// Raw response bytes cut into lines. Text is decoded one complete line at
/// a time, so a character split across network reads stays intact.
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.bytes.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Drain a stream into the full response text.
pub async fn collect_stream(mut stream: BoxedStream) -> Result<String, String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Token(t) => text.push_str(&t),
            StreamChunk::Done { tokens_used } => {
                debug!("Stream finished after {} tokens", tokens_used);
                break;
            }
            StreamChunk::Error(e) => return Err(e),
        }
    }
    Ok(text)
}
