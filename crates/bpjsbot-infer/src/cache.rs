//! Bounded LRU cache of embeddings keyed by input text.
//!
//! Question embeddings repeat often (users re-ask, examples are embedded
//! once per selection), so the ONNX embedder keeps recent results here.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

struct Entry {
    embedding: Array1<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU cache with a per-entry time to live.
pub struct EmbeddingCache {
    inner: Mutex<Inner>,
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// Keys from least to most recently used.
    recency: VecDeque<String>,
    capacity: usize,
    ttl: Duration,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    fn forget(&mut self, key: &str) {
        self.entries.remove(key);
        self.recency.retain(|k| k != key);
    }
}

impl EmbeddingCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                recency: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                ttl,
            }),
        }
    }

    /// 2000 entries, one hour.
    pub fn with_defaults() -> Self {
        Self::new(2000, Duration::from_secs(3600))
    }

    /// Cached embedding for `text`, if present and not expired.
    pub fn get(&self, text: &str) -> Option<Array1<f32>> {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;
        let hit = match inner.entries.get(text) {
            Some(e) if e.inserted_at.elapsed() < ttl => e.embedding.clone(),
            Some(_) => {
                inner.forget(text);
                return None;
            }
            None => return None,
        };
        inner.touch(text);
        Some(hit)
    }

    pub fn put(&self, text: &str, embedding: Array1<f32>) {
        let mut inner = self.inner.lock();
        let entry = Entry {
            embedding,
            inserted_at: Instant::now(),
        };

        if inner.entries.insert(text.to_string(), entry).is_some() {
            inner.touch(text);
            return;
        }
        inner.recency.push_back(text.to_string());

        while inner.entries.len() > inner.capacity {
            match inner.recency.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
