//! Index trait definitions.

use crate::embedding::EmbeddingError;
use crate::fragment::{Fragment, FragmentId, PriorityTag};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Embedding shape incompatible with the index. Fatal to the upsert
    /// call; the whole batch is rejected before any write.
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// A fragment together with its stored embedding vector.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub fragment: Fragment,
    pub vector: Vec<f32>,
}

/// Aggregate statistics over the indexed corpus.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct IndexStats {
    pub fragment_count: usize,
    pub document_count: usize,
    /// Fragment counts per priority tag.
    pub priority_counts: BTreeMap<String, usize>,
}

/// Metadata pre-filter applied before similarity scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub document_id: Option<String>,
    pub page_number: Option<u32>,
    pub priority_tag: Option<PriorityTag>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn with_priority(mut self, priority_tag: PriorityTag) -> Self {
        self.priority_tag = Some(priority_tag);
        self
    }

    /// Whether a fragment passes this filter.
    pub fn matches(&self, fragment: &Fragment) -> bool {
        if let Some(doc) = &self.document_id {
            if &fragment.document_id != doc {
                return false;
            }
        }
        if let Some(page) = self.page_number {
            if fragment.page_number != page {
                return false;
            }
        }
        if let Some(tag) = self.priority_tag {
            if fragment.priority_tag != tag {
                return false;
            }
        }
        true
    }
}

/// Trait for persistent fragment/vector storage backends.
///
/// Implementations must be thread-safe (Send + Sync). Upserts are
/// last-write-wins per fragment id; a crash between two upserts must leave
/// previously committed entries queryable.
pub trait FragmentIndex: Send + Sync {
    /// The fixed dimensionality of vectors stored in this index.
    fn dimensions(&self) -> usize;

    /// Insert or replace one fragment and its vector, keyed by fragment id.
    fn upsert_entry(&self, fragment: &Fragment, vector: &[f32]) -> IndexResult<()>;

    /// Load a fragment by id.
    fn get(&self, id: &FragmentId) -> IndexResult<Option<Fragment>>;

    /// Remove all fragments of one document; returns the count removed.
    fn delete_by_document(&self, document_id: &str) -> IndexResult<usize>;

    /// All entries passing the filter, in no guaranteed order. Callers that
    /// need a stable order must sort; the underlying backends do not
    /// guarantee insertion order.
    fn scan(&self, filter: &SearchFilter) -> IndexResult<Vec<IndexEntry>>;

    /// Aggregate statistics over the indexed corpus.
    fn stats(&self) -> IndexResult<IndexStats>;

    /// Remove every entry.
    fn clear(&self) -> IndexResult<()>;
}
