//! In-memory fragment index.
//!
//! Thread-safe via RwLock. Used by tests and ephemeral runs; the production
//! path is [`super::SqliteIndex`].

use super::traits::{FragmentIndex, IndexEntry, IndexError, IndexResult, IndexStats, SearchFilter};
use crate::fragment::{Fragment, FragmentId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

/// HashMap-backed index keyed by fragment id.
pub struct MemoryIndex {
    dimensions: usize,
    entries: RwLock<HashMap<FragmentId, IndexEntry>>,
}

impl MemoryIndex {
    /// Create an empty index with a fixed vector dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl FragmentIndex for MemoryIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert_entry(&self, fragment: &Fragment, vector: &[f32]) -> IndexResult<()> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        self.entries.write().unwrap().insert(
            fragment.id.clone(),
            IndexEntry {
                fragment: fragment.clone(),
                vector: vector.to_vec(),
            },
        );
        Ok(())
    }

    fn get(&self, id: &FragmentId) -> IndexResult<Option<Fragment>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .get(id)
            .map(|e| e.fragment.clone()))
    }

    fn delete_by_document(&self, document_id: &str) -> IndexResult<usize> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.fragment.document_id != document_id);
        Ok(before - entries.len())
    }

    fn scan(&self, filter: &SearchFilter) -> IndexResult<Vec<IndexEntry>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .values()
            .filter(|e| filter.matches(&e.fragment))
            .cloned()
            .collect())
    }

    fn stats(&self) -> IndexResult<IndexStats> {
        let entries = self.entries.read().unwrap();
        let documents: HashSet<&str> = entries
            .values()
            .map(|e| e.fragment.document_id.as_str())
            .collect();
        let mut priority_counts = BTreeMap::new();
        for entry in entries.values() {
            *priority_counts
                .entry(entry.fragment.priority_tag.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(IndexStats {
            fragment_count: entries.len(),
            document_count: documents.len(),
            priority_counts,
        })
    }

    fn clear(&self) -> IndexResult<()> {
        self.entries.write().unwrap().clear();
        Ok(())
    }
}
