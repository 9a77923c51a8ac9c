//! Document ingestion: PDF pages in, searchable page index out.

pub mod indexer;
pub mod pdf;
pub mod upload;

pub use indexer::{IndexReport, PageIndexer};
pub use pdf::{extract_pages, extract_pages_from_mem};
pub use upload::{allowed_file, secure_filename};
