//! Batch indexer: embeds fragments and writes them to the index.

use super::traits::{FragmentIndex, IndexError, IndexResult, IndexStats};
use crate::embedding::Embedder;
use crate::fragment::Fragment;
use std::sync::Arc;
use tracing::debug;

/// Turns fragments into vectors and upserts them into a [`FragmentIndex`].
///
/// Upserts are last-write-wins per fragment id. Dimension validation happens
/// for the whole batch before any write, so a `DimensionMismatch` rejects the
/// batch; after validation, writes are committed per fragment, so a crash
/// mid-batch never corrupts previously committed entries.
pub struct Indexer {
    index: Arc<dyn FragmentIndex>,
    embedder: Arc<dyn Embedder>,
}

impl Indexer {
    pub fn new(index: Arc<dyn FragmentIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }

    /// Embed and upsert a batch of fragments. Returns the number written.
    pub fn upsert(&self, fragments: &[Fragment]) -> IndexResult<usize> {
        if fragments.is_empty() {
            return Ok(0);
        }
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        self.check_batch(fragments.len(), &vectors)?;

        for (fragment, vector) in fragments.iter().zip(vectors.iter()) {
            self.index.upsert_entry(fragment, vector)?;
        }
        debug!(count = fragments.len(), "indexed fragment batch");
        Ok(fragments.len())
    }

    /// Upsert fragments whose vectors were computed outside the engine.
    pub fn upsert_precomputed(&self, entries: &[(Fragment, Vec<f32>)]) -> IndexResult<usize> {
        let vectors: Vec<Vec<f32>> = entries.iter().map(|(_, v)| v.clone()).collect();
        self.check_batch(entries.len(), &vectors)?;

        for (fragment, vector) in entries {
            self.index.upsert_entry(fragment, vector)?;
        }
        debug!(count = entries.len(), "indexed precomputed batch");
        Ok(entries.len())
    }

    /// Remove all fragments of one document; returns the count removed.
    pub fn delete_by_document(&self, document_id: &str) -> IndexResult<usize> {
        let removed = self.index.delete_by_document(document_id)?;
        debug!(document_id, removed, "deleted document fragments");
        Ok(removed)
    }

    /// Remove every indexed fragment.
    pub fn clear(&self) -> IndexResult<()> {
        self.index.clear()
    }

    pub fn stats(&self) -> IndexResult<IndexStats> {
        self.index.stats()
    }

    /// Validate every vector in the batch before the first write.
    fn check_batch(&self, expected_count: usize, vectors: &[Vec<f32>]) -> IndexResult<()> {
        if vectors.len() != expected_count {
            return Err(IndexError::Embedding(
                crate::embedding::EmbeddingError::EmptyResult,
            ));
        }
        let dims = self.index.dimensions();
        for vector in vectors {
            if vector.len() != dims {
                return Err(IndexError::DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }
}
