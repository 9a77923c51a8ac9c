//! all-MiniLM-L6-v2 through ONNX Runtime. Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use bpjsbot_core::{Error, Result};
    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::{info, warn};

    use crate::cache::EmbeddingCache;
    use crate::embedder::Embedder;
    use crate::MINILM_DIM;

    /// MiniLM was trained on sequences of at most 256 tokens.
    const MAX_SEQ_LEN: usize = 256;

    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        cache: EmbeddingCache,
    }

    impl OnnxEmbedder {
        /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::Inference(format!(
                    "Model not found: {}",
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(Error::Inference(format!(
                    "Tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.so
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::Inference(format!("Failed to create session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::Inference(format!("Failed to set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Inference(format!("Failed to load ONNX model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Inference(format!("Failed to load tokenizer: {}", e)))?;

            info!("ONNX embedder loaded from {}", model_path.display());

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                cache: EmbeddingCache::with_defaults(),
            })
        }

        fn infer(&self, text: &str) -> Option<Array1<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| warn!("Tokenization failed: {}", e))
                .ok()?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            let ids: Vec<i64> = encoding.get_ids()[..seq_len]
                .iter()
                .map(|&id| id as i64)
                .collect();
            let mask: Vec<i64> = encoding.get_attention_mask()[..seq_len]
                .iter()
                .map(|&m| m as i64)
                .collect();
            let type_ids = vec![0i64; seq_len];

            let tensor = |data: Vec<i64>| {
                Tensor::from_array(([1usize, seq_len], data))
                    .map_err(|e| warn!("Failed to build input tensor: {}", e))
                    .ok()
            };
            let inputs = ort::inputs![tensor(ids)?, tensor(mask.clone())?, tensor(type_ids)?];

            let mut session = self.session.lock();
            let outputs = session
                .run(inputs)
                .map_err(|e| warn!("ONNX inference failed: {}", e))
                .ok()?;
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| warn!("Failed to extract output tensor: {}", e))
                .ok()?;
            let dims: Vec<i64> = shape.iter().copied().collect();

            let pooled = match dims.as_slice() {
                // token_embeddings [1, seq, dim]: masked mean pooling
                [_, _, dim] => {
                    let dim = *dim as usize;
                    let count = mask.iter().filter(|&&m| m > 0).count();
                    if count == 0 {
                        return None;
                    }
                    let mut sum = Array1::<f32>::zeros(dim);
                    for (i, _) in mask.iter().enumerate().filter(|(_, &m)| m > 0) {
                        let token = &data[i * dim..(i + 1) * dim];
                        sum.iter_mut().zip(token).for_each(|(s, v)| *s += v);
                    }
                    sum / count as f32
                }
                // sentence_embedding [1, dim]
                [_, dim] => Array1::from_vec(data[..*dim as usize].to_vec()),
                other => {
                    warn!("Unexpected output shape: {:?}", other);
                    return None;
                }
            };

            // sentence-transformers normalizes MiniLM output
            let norm = pooled.dot(&pooled).sqrt();
            if norm < 1e-9 {
                return None;
            }
            Some(pooled / norm)
        }
    }

    impl Embedder for OnnxEmbedder {
        fn embed(&self, text: &str) -> Option<Array1<f32>> {
            if let Some(hit) = self.cache.get(text) {
                return Some(hit);
            }
            let embedding = self.infer(text)?;
            self.cache.put(text, embedding.clone());
            Some(embedding)
        }

        fn dimension(&self) -> usize {
            MINILM_DIM
        }

        fn is_available(&self) -> bool {
            true
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
