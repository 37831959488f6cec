//! Common test utilities for end-to-end engine tests.
//!
//! Provides a deterministic bag-of-words embedder so retrieval behavior is
//! reproducible without a model download, plus fragment and engine builders.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use veridex::{
    Embedder, EmbeddingError, EngineConfig, EvidenceEngine, Fragment, MemoryAuditLog,
    MemoryIndex, PriorityTag,
};

pub const DIMS: usize = 64;

/// Deterministic embedder: hashes lowercased tokens into a fixed number of
/// buckets and L2-normalizes. Identical texts embed identically; texts with
/// more shared tokens score higher cosine similarity.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Embedder for HashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dims];
                for token in text.split_whitespace() {
                    let mut hasher = DefaultHasher::new();
                    token.to_lowercase().hash(&mut hasher);
                    vector[(hasher.finish() as usize) % self.dims] += 1.0;
                }
                let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for x in &mut vector {
                        *x /= norm;
                    }
                }
                vector
            })
            .collect())
    }
}

pub fn fragment(
    id: &str,
    document_id: &str,
    page: u32,
    text: &str,
    priority: PriorityTag,
    trusted: bool,
) -> Fragment {
    Fragment::with_id(id, document_id, page, (0, text.len()), text, priority, trusted)
}

/// In-memory engine with the hash embedder and a collecting audit log.
pub fn test_engine() -> (EvidenceEngine, Arc<MemoryAuditLog>) {
    let config = EngineConfig {
        dimensions: DIMS,
        ..EngineConfig::default()
    };
    let audit = Arc::new(MemoryAuditLog::new());
    let engine = EvidenceEngine::new(
        config,
        Arc::new(MemoryIndex::new(DIMS)),
        Arc::new(HashEmbedder::new(DIMS)),
        audit.clone(),
    )
    .expect("default config is valid");
    (engine, audit)
}
