//! Sentence embeddings for few-shot example selection and PDF page search.
//!
//! With the `onnx` feature and model files under the models directory,
//! `OnnxEmbedder` produces 384-dim MiniLM embeddings. Otherwise
//! `NoopEmbedder` is used: examples are picked by word overlap and pages
//! are found through BM25.

pub mod cache;
pub mod embedder;
pub mod onnx_embedder;

pub use cache::EmbeddingCache;
pub use embedder::{cosine_similarity, Embedder, NoopEmbedder};

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

/// Dimension of all-MiniLM-L6-v2 embeddings.
pub const MINILM_DIM: usize = 384;

/// Create the best available embedder for the given model directory.
pub fn create_embedder(model_dir: &Path) -> Arc<dyn Embedder> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir) {
            Ok(embedder) => {
                tracing::info!("Using ONNX embedder (dim={})", embedder.dimension());
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!("ONNX embedder unavailable: {}. Using keyword matching.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::info!("ONNX feature disabled. Using keyword matching.");
    }

    Arc::new(NoopEmbedder::new(MINILM_DIM))
}
