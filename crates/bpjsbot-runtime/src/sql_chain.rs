//! Natural language to SQL: generate a query, run it, phrase the result.

use std::sync::Arc;

use bpjsbot_chat::{ChatMessage, ChatModel, CompletionRequest};
use bpjsbot_core::Result;
use bpjsbot_store::{SqlDatabase, SqliteStore};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::examples::{ExampleSelector, EXAMPLES_PER_PROMPT};
use crate::prompts;

/// Dialect named in the generation prompt.
const DIALECT: &str = "SQLite";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(?:sql|SQL)?\s*(.*?)```").unwrap());
static QUERY_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*SQLQuery:\s*").unwrap());

/// Strip what models wrap around a query: backslashes, code fences, a
/// leading `SQLQuery:` and anything from `SQLResult:` on.
pub fn clean_query(raw: &str) -> String {
    let text = raw.replace('\\', "");
    let text = match CODE_FENCE.captures(&text) {
        Some(c) => c[1].to_string(),
        None => text,
    };
    let text = match text.find("SQLResult:") {
        Some(idx) => &text[..idx],
        None => text.as_str(),
    };
    QUERY_MARKER.replace(text, "").trim().to_string()
}

/// The `/sql` pipeline.
pub struct SqlChain {
    db: Arc<SqlDatabase>,
    store: Arc<SqliteStore>,
    model: Arc<dyn ChatModel>,
    selector: ExampleSelector,
    history_window: usize,
}

impl SqlChain {
    pub fn new(
        db: Arc<SqlDatabase>,
        store: Arc<SqliteStore>,
        model: Arc<dyn ChatModel>,
        selector: ExampleSelector,
        history_window: usize,
    ) -> Self {
        Self {
            db,
            store,
            model,
            selector,
            history_window,
        }
    }

    pub fn database(&self) -> &SqlDatabase {
        &self.db
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Previous turns of the conversation as alternating messages.
    fn history_messages(&self, conversation_id: Option<&str>) -> Result<Vec<ChatMessage>> {
        let conversation_id = match conversation_id {
            Some(id) if self.history_window > 0 => id,
            _ => return Ok(Vec::new()),
        };
        let turns = self.store.recent_turns(conversation_id, self.history_window)?;
        let mut messages = Vec::with_capacity(turns.len() * 2);
        for turn in turns {
            if let Some(question) = turn.user_question {
                messages.push(ChatMessage::user(question));
                messages.push(ChatMessage::assistant(turn.bot));
            }
        }
        Ok(messages)
    }

    /// Messages of the query generation call.
    pub fn generation_prompt(
        &self,
        question: &str,
        history: Vec<ChatMessage>,
    ) -> Result<Vec<ChatMessage>> {
        let table_info = self.db.table_info()?;
        let mut messages = vec![ChatMessage::system(prompts::sql_system(DIALECT, &table_info))];
        for example in self.selector.select(question, EXAMPLES_PER_PROMPT) {
            messages.push(ChatMessage::user(prompts::sql_human_turn(&example.input)));
            messages.push(ChatMessage::assistant(example.query.clone()));
        }
        messages.extend(history);
        messages.push(ChatMessage::user(prompts::sql_human_turn(question)));
        Ok(messages)
    }

    /// Run the query; `None` when it fails or is refused.
    fn execute(&self, query: &str) -> Option<Vec<serde_json::Map<String, Value>>> {
        match self.db.run_query(query) {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("Generated query failed: {}", e);
                None
            }
        }
    }

    /// Answer `question`, using earlier turns of `conversation_id` as context.
    pub async fn answer(&self, question: &str, conversation_id: Option<&str>) -> Result<String> {
        let history = self.history_messages(conversation_id)?;
        let messages = self.generation_prompt(question, history)?;

        let raw = self
            .model
            .complete(CompletionRequest::new(messages).with_stop(prompts::SQL_RESULT_STOP))
            .await?;
        let query = clean_query(&raw);
        debug!("Generated query: {}", query);

        let result = match self.execute(&query) {
            Some(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
            None => Value::Null,
        };
        let result = serde_json::to_string(&result)?;

        let answer = self
            .model
            .complete(CompletionRequest::prompt(prompts::rephrase(
                question, &query, &result,
            )))
            .await?;

        info!("SQL answer ready ({} chars) via {}", answer.len(), self.model.describe());
        Ok(answer.trim().to_string())
    }
}
