//! Row types for history, users and indexed pages.

use serde::{Deserialize, Serialize};

/// A row of the `history` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub user: String,
    pub bot: String,
    pub conversation_id: Option<String>,
    pub user_question: Option<String>,
    pub created_at: String,
}

/// One conversation of a user, as listed in the chat sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    /// The first question asked in the conversation.
    pub first_message_snippet: Option<String>,
    /// Time of the latest message in the conversation.
    pub created_at: String,
    pub user: String,
}

/// A registered account. `password_hash` never leaves the server.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

/// One page of the indexed PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfPage {
    pub id: i64,
    pub filename: String,
    /// Zero-based page number.
    pub page: i64,
    pub text: String,
    pub created_at: String,
}

/// A page returned by similarity or full-text search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageHit {
    pub page_id: i64,
    pub page: i64,
    pub text: String,
    pub score: f64,
}
