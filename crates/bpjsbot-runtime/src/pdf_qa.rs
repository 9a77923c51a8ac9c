//! Question answering over the indexed PDF.

use std::sync::Arc;

use bpjsbot_chat::{ChatModel, CompletionRequest};
use bpjsbot_core::{Error, Result};
use bpjsbot_infer::Embedder;
use bpjsbot_store::{PageHit, SqliteStore};
use tracing::{debug, warn};

use crate::prompts;

/// Pages retrieved per question.
pub const PAGES_PER_QUESTION: usize = 3;

/// The `/pdf` pipeline.
pub struct PdfAnswerer {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
}

impl PdfAnswerer {
    pub fn new(
        store: Arc<SqliteStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            store,
            embedder,
            model,
        }
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Pages most relevant to `question`. Vector search when page
    /// embeddings exist, BM25 otherwise.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<PageHit>> {
        if self.store.count_page_embeddings()? > 0 {
            if let Some(q) = self.embedder.embed(question) {
                let hits = self.store.vector_search_pages(&q, k)?;
                if !hits.is_empty() {
                    return Ok(hits);
                }
            }
        }
        self.store.bm25_search_pages(question, k)
    }

    /// Answer `question` from the document. Model failures are returned as
    /// the answer text; only store failures are errors.
    pub async fn answer(&self, question: &str) -> Result<String> {
        if self.store.count_pages()? == 0 {
            return Ok(prompts::PDF_UNAVAILABLE.to_string());
        }

        let hits = self.retrieve(question, PAGES_PER_QUESTION)?;
        if hits.is_empty() {
            return Ok(prompts::PDF_NOT_FOUND.to_string());
        }
        debug!(
            "Retrieved pages {:?} for PDF question",
            hits.iter().map(|h| h.page).collect::<Vec<_>>()
        );

        let excerpts = hits
            .iter()
            .map(|h| prompts::page_excerpt(h.page, &h.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = prompts::pdf_question(question, &excerpts);

        match self.model.complete(CompletionRequest::prompt(prompt)).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(Error::Llm(msg)) => {
                warn!("PDF model failed: {}", msg);
                Ok(prompts::pdf_model_failure(&msg))
            }
            Err(e) => {
                warn!("PDF model failed: {}", e);
                Ok(prompts::pdf_model_failure(&e.to_string()))
            }
        }
    }
}
