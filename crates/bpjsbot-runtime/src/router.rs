//! Command parsing and dispatch to the answer pipelines.

use tracing::{info, warn};

use crate::pdf_qa::PdfAnswerer;
use crate::prompts;
use crate::sql_chain::SqlChain;

const SQL_PREFIX: &str = "/sql ";
const PDF_PREFIX: &str = "/pdf ";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/sql <question>`
    Sql(String),
    /// `/pdf <question>`
    Pdf(String),
    /// Anything else, kept verbatim.
    Unknown(String),
}

impl Command {
    /// Prefixes are case-sensitive and need the trailing space.
    pub fn parse(text: &str) -> Self {
        if let Some(q) = text.strip_prefix(SQL_PREFIX) {
            Command::Sql(q.to_string())
        } else if let Some(q) = text.strip_prefix(PDF_PREFIX) {
            Command::Pdf(q.to_string())
        } else {
            Command::Unknown(text.to_string())
        }
    }

    /// What gets stored as the user's question.
    pub fn user_question(&self) -> &str {
        match self {
            Command::Sql(q) | Command::Pdf(q) | Command::Unknown(q) => q,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Sql(_) => "sql",
            Command::Pdf(_) => "pdf",
            Command::Unknown(_) => "unknown",
        }
    }
}

/// Runs a command through the matching pipeline.
pub struct ChatRouter {
    sql: SqlChain,
    pdf: PdfAnswerer,
}

impl ChatRouter {
    pub fn new(sql: SqlChain, pdf: PdfAnswerer) -> Self {
        Self { sql, pdf }
    }

    pub fn sql(&self) -> &SqlChain {
        &self.sql
    }

    pub fn pdf(&self) -> &PdfAnswerer {
        &self.pdf
    }

    /// The bot's reply. Never fails: pipeline errors become reply text.
    pub async fn answer(&self, command: &Command, conversation_id: Option<&str>) -> String {
        info!("Answering {} command", command.kind());
        match command {
            Command::Sql(question) => match self.sql.answer(question, conversation_id).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!("SQL pipeline failed: {}", e);
                    prompts::sql_failure(&e.to_string())
                }
            },
            Command::Pdf(question) => match self.pdf.answer(question).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!("PDF pipeline failed: {}", e);
                    prompts::pdf_failure(&e.to_string())
                }
            },
            Command::Unknown(_) => prompts::USAGE.to_string(),
        }
    }
}
