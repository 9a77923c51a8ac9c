//! Test doubles shared by the pipeline tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use bpjsbot_chat::{ChatModel, CompletionRequest};
use bpjsbot_core::{Error, Result};
use parking_lot::Mutex;

/// Replays canned replies in order and records every request.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn request(&self, i: usize) -> CompletionRequest {
        self.requests.lock()[i].clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Llm("no scripted reply left".into())))
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}
