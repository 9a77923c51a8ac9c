//! The `Embedder` trait and its no-model fallback.

use ndarray::Array1;

/// Turns text into a fixed-size vector.
pub trait Embedder: Send + Sync {
    /// Embed a single text. `None` when no model is loaded or inference failed.
    fn embed(&self, text: &str) -> Option<Array1<f32>>;

    /// Embed several texts, one result per input.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Option<Array1<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize;

    /// Whether a model is loaded.
    fn is_available(&self) -> bool;
}

/// Embedder used when no model is present. Never produces vectors.
pub struct NoopEmbedder {
    dim: usize,
}

impl NoopEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for NoopEmbedder {
    fn embed(&self, _text: &str) -> Option<Array1<f32>> {
        None
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Cosine similarity of two vectors; 0.0 when either is zero or the
/// lengths differ.
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let norms = a.dot(a).sqrt() * b.dot(b).sqrt();
    if norms < 1e-9 {
        0.0
    } else {
        a.dot(b) / norms
    }
}
