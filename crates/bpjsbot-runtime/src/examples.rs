//! Few-shot examples for query generation and their selection.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use bpjsbot_core::{Error, Result};
use bpjsbot_infer::{cosine_similarity, Embedder};
use ndarray::Array1;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Examples shown to the model per question.
pub const EXAMPLES_PER_PROMPT: usize = 2;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());

/// A question paired with the query that answers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlExample {
    pub input: String,
    pub query: String,
}

impl SqlExample {
    pub fn new(input: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            query: query.into(),
        }
    }
}

/// Built-in examples over the BPJS tables.
pub fn default_examples() -> Vec<SqlExample> {
    vec![
        SqlExample::new(
            "Tampilkan data user dengan NIK 1234567890123456",
            "SELECT * FROM users WHERE nik = '1234567890123456';",
        ),
        SqlExample::new(
            "Berikan semua keluhan dengan kategori admin",
            "SELECT * FROM keluhan_masyarakat WHERE kategori = 'admin';",
        ),
        SqlExample::new(
            "Sebutkan rumah sakit untuk pasien anak",
            "SELECT rumah_sakit FROM rujukan_medis WHERE saran_spesialis = 'Spesialis Anak';",
        ),
    ]
}

/// Examples from a JSON array file, or the built-in ones when the file is
/// absent. A file that exists but does not parse is an error.
pub fn load_examples(path: &Path) -> Result<Vec<SqlExample>> {
    if !path.exists() {
        return Ok(default_examples());
    }
    let raw = std::fs::read_to_string(path)?;
    let examples: Vec<SqlExample> = serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    if examples.is_empty() {
        warn!("{} holds no examples; using built-in ones", path.display());
        return Ok(default_examples());
    }
    info!("Loaded {} SQL examples from {}", examples.len(), path.display());
    Ok(examples)
}

fn words(text: &str) -> HashSet<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard similarity of the word sets.
fn word_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Picks the examples closest to a question.
///
/// Uses embedding similarity when the embedder is loaded, word overlap
/// otherwise. Ties keep the configured order.
pub struct ExampleSelector {
    examples: Vec<SqlExample>,
    embedder: Arc<dyn Embedder>,
    /// One per example, present only when every example embedded.
    embeddings: Option<Vec<Array1<f32>>>,
    word_sets: Vec<HashSet<String>>,
}

impl ExampleSelector {
    pub fn new(examples: Vec<SqlExample>, embedder: Arc<dyn Embedder>) -> Self {
        let embeddings = if embedder.is_available() {
            let inputs: Vec<&str> = examples.iter().map(|e| e.input.as_str()).collect();
            let embedded: Option<Vec<_>> = embedder.embed_batch(&inputs).into_iter().collect();
            if embedded.is_none() {
                warn!("Some SQL examples failed to embed; selecting by word overlap");
            }
            embedded
        } else {
            None
        };
        let word_sets = examples.iter().map(|e| words(&e.input)).collect();

        debug!(
            "Example selector ready: {} examples, semantic={}",
            examples.len(),
            embeddings.is_some()
        );

        Self {
            examples,
            embedder,
            embeddings,
            word_sets,
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// The `k` examples most similar to `question`, most similar first.
    pub fn select(&self, question: &str, k: usize) -> Vec<&SqlExample> {
        let scores: Vec<f32> = match (&self.embeddings, self.embedder.embed(question)) {
            (Some(embeddings), Some(q)) => embeddings
                .iter()
                .map(|e| cosine_similarity(e, &q))
                .collect(),
            _ => {
                let q = words(question);
                self.word_sets.iter().map(|w| word_overlap(w, &q)).collect()
            }
        };

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
            .into_iter()
            .take(k)
            .map(|(i, _)| &self.examples[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpjsbot_infer::NoopEmbedder;
    use tempfile::TempDir;

    /// Embeds by a fixed topic vocabulary.
    struct TopicEmbedder;

    impl Embedder for TopicEmbedder {
        fn embed(&self, text: &str) -> Option<Array1<f32>> {
            let t = text.to_lowercase();
            let has = |w: &str| if t.contains(w) { 1.0 } else { 0.0 };
            Some(Array1::from_vec(vec![
                has("nik") + has("user") + has("peserta"),
                has("keluhan") + has("pengaduan"),
                has("rumah sakit") + has("rujukan") + has("dokter"),
                0.1,
            ]))
        }

        fn dimension(&self) -> usize {
            4
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_word_overlap_selection() {
        let selector = ExampleSelector::new(default_examples(), Arc::new(NoopEmbedder::new(384)));
        let picked = selector.select("berapa keluhan dengan kategori layanan?", 2);
        assert_eq!(picked.len(), 2);
        assert!(picked[0].query.contains("keluhan_masyarakat"));
    }

    #[test]
    fn test_semantic_selection() {
        let selector = ExampleSelector::new(default_examples(), Arc::new(TopicEmbedder));
        // No word in common with the hospital example, same topic though
        let picked = selector.select("Daftar dokter untuk rujukan", 1);
        assert!(picked[0].query.contains("rujukan_medis"));
    }

    #[test]
    fn test_k_larger_than_pool() {
        let selector = ExampleSelector::new(default_examples(), Arc::new(NoopEmbedder::new(384)));
        assert_eq!(selector.select("apa saja", 10).len(), 3);
        assert_eq!(selector.len(), 3);
    }

    #[test]
    fn test_load_examples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sql-examples.json");
        assert_eq!(load_examples(&path).unwrap(), default_examples());

        std::fs::write(
            &path,
            r#"[{"input": "Jumlah peserta aktif", "query": "SELECT COUNT(*) FROM peserta WHERE aktif = 1;"}]"#,
        )
        .unwrap();
        let loaded = load_examples(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].input, "Jumlah peserta aktif");

        std::fs::write(&path, "bukan json").unwrap();
        assert!(matches!(load_examples(&path), Err(Error::Config(_))));
    }
}
