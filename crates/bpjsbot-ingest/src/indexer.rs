//! Builds the page index for a PDF: extract, store, embed.

use std::path::Path;
use std::sync::Arc;

use bpjsbot_core::{Error, Result};
use bpjsbot_infer::Embedder;
use bpjsbot_store::SqliteStore;
use tracing::{info, warn};

use crate::pdf;

/// Outcome of indexing one document.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub filename: String,
    pub pages: usize,
    /// Pages that received an embedding. Zero without a model.
    pub embedded: usize,
}

/// Replaces the store's page index with the pages of a PDF.
///
/// All methods block; call them from `spawn_blocking` in async code.
pub struct PageIndexer {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
}

impl PageIndexer {
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Index the PDF at `path`, replacing any previous document.
    pub fn index_file(&self, path: &Path) -> Result<IndexReport> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.pdf")
            .to_string();
        let pages = pdf::extract_pages(path)?;
        self.index_pages(&filename, pages)
    }

    /// Index already extracted page texts.
    pub fn index_pages(&self, filename: &str, pages: Vec<String>) -> Result<IndexReport> {
        if !pdf::has_text(&pages) {
            return Err(Error::Ingest(format!(
                "{} contains no extractable text",
                filename
            )));
        }

        let page_ids = self.store.replace_pages(filename, &pages)?;
        let embedded = self.embed_pages(&page_ids, &pages)?;

        info!(
            "Indexed {}: {} pages, {} embedded",
            filename,
            page_ids.len(),
            embedded
        );

        Ok(IndexReport {
            filename: filename.to_string(),
            pages: page_ids.len(),
            embedded,
        })
    }

    fn embed_pages(&self, page_ids: &[i64], pages: &[String]) -> Result<usize> {
        if !self.embedder.is_available() {
            return Ok(0);
        }

        let targets: Vec<(i64, &str)> = page_ids
            .iter()
            .copied()
            .zip(pages.iter().map(String::as_str))
            .filter(|(_, text)| !text.is_empty())
            .collect();
        let texts: Vec<&str> = targets.iter().map(|(_, t)| *t).collect();
        let embeddings = self.embedder.embed_batch(&texts);

        let mut embedded = 0;
        for ((page_id, _), embedding) in targets.iter().zip(embeddings) {
            match embedding {
                Some(v) => {
                    self.store.add_page_embedding(*page_id, &v)?;
                    embedded += 1;
                }
                None => warn!("No embedding for page row {}", page_id),
            }
        }
        Ok(embedded)
    }

    /// Index `path` at startup when the page index is empty and the file
    /// exists. Failures are logged and otherwise ignored.
    pub fn load_initial(&self, path: &Path) -> Option<IndexReport> {
        match self.store.count_pages() {
            Ok(n) if n > 0 => {
                info!("Page index already holds {} pages", n);
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Could not inspect page index: {}", e);
                return None;
            }
        }
        if !path.exists() {
            info!("No initial PDF at {}", path.display());
            return None;
        }
        match self.index_file(path) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("PDF loading error: {}", e);
                None
            }
        }
    }
}
