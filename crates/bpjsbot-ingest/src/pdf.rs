//! Per-page text extraction from PDF files.

use std::path::Path;

use bpjsbot_core::{Error, Result};
use tracing::debug;

/// Text of each page of the PDF at `path`, in page order.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::Ingest(format!("Failed to read PDF file {}: {}", path.display(), e))
    })?;
    let pages = extract_pages_from_mem(&bytes)?;
    debug!("Extracted {} pages from {}", pages.len(), path.display());
    Ok(pages)
}

/// Text of each page of an in-memory PDF.
pub fn extract_pages_from_mem(bytes: &[u8]) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::Ingest(format!("Failed to extract text from PDF: {}", e)))?;
    Ok(pages.into_iter().map(|p| p.trim().to_string()).collect())
}

/// Whether any page carries text. Scanned documents have none.
pub fn has_text(pages: &[String]) -> bool {
    pages.iter().any(|p| !p.is_empty())
}
