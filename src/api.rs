//! Consumer-facing API layer.
//!
//! [`EvidenceEngine`] is the single entry point for indexing, retrieval, and
//! validation. Transports (the CLI binary, direct embedding in a host
//! application) call engine methods; they never reach into the component
//! structs directly. All components share one index, one embedder, and one
//! audit sink.

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::config::{ConfigError, EngineConfig};
use crate::embedding::Embedder;
use crate::fragment::{CandidateStep, Fragment};
use crate::index::{FragmentIndex, IndexResult, IndexStats, Indexer, SearchFilter};
use crate::retrieve::{RetrievedFragment, Retriever, RetrieveError};
use crate::validate::{Decision, Mode, StepValidator, ValidateError};
use thiserror::Error;

/// Errors from the combined retrieve-then-validate entry point.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error(transparent)]
    Validate(#[from] ValidateError),
}

/// Single entry point for all consumer-facing operations.
pub struct EvidenceEngine {
    config: EngineConfig,
    indexer: Indexer,
    retriever: Retriever,
    validator: StepValidator,
}

impl EvidenceEngine {
    /// Wire the engine over shared components. The configuration is
    /// validated here; out-of-range values never reach the pipeline.
    pub fn new(
        config: EngineConfig,
        index: Arc<dyn FragmentIndex>,
        embedder: Arc<dyn Embedder>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let indexer = Indexer::new(index.clone(), embedder.clone());
        let retriever = Retriever::new(index, embedder.clone(), audit.clone(), config.clone());
        let validator = StepValidator::new(&config, embedder, audit);
        Ok(Self {
            config,
            indexer,
            retriever,
            validator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- Indexing ---

    /// Embed and upsert fragments; returns the number written.
    pub fn index_fragments(&self, fragments: &[Fragment]) -> IndexResult<usize> {
        self.indexer.upsert(fragments)
    }

    /// Upsert fragments with vectors computed outside the engine.
    pub fn index_precomputed(&self, entries: &[(Fragment, Vec<f32>)]) -> IndexResult<usize> {
        self.indexer.upsert_precomputed(entries)
    }

    /// Remove all fragments of one document; returns the count removed.
    pub fn delete_document(&self, document_id: &str) -> IndexResult<usize> {
        self.indexer.delete_by_document(document_id)
    }

    /// Remove every indexed fragment.
    pub fn clear(&self) -> IndexResult<()> {
        self.indexer.clear()
    }

    pub fn stats(&self) -> IndexResult<IndexStats> {
        self.indexer.stats()
    }

    // --- Retrieval ---

    /// Boosted, rank-ordered similarity search.
    pub fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedFragment>, RetrieveError> {
        self.retriever.search(query, top_k, filter)
    }

    /// All fragments of one page, ordered by fragment id.
    pub fn fragments_for_page(
        &self,
        document_id: &str,
        page_number: u32,
    ) -> Result<Vec<Fragment>, RetrieveError> {
        self.retriever.fragments_for_page(document_id, page_number)
    }

    // --- Validation ---

    /// Validate candidate steps against already-retrieved evidence.
    pub fn validate(
        &self,
        steps: &[CandidateStep],
        evidence: &[RetrievedFragment],
        mode: Mode,
    ) -> Result<Decision, ValidateError> {
        self.validator.validate(steps, evidence, mode)
    }

    /// Retrieve evidence for the query, then validate the steps against it.
    pub fn validate_answer(
        &self,
        query: &str,
        steps: &[CandidateStep],
        mode: Mode,
        top_k: Option<usize>,
    ) -> Result<Decision, EngineError> {
        let evidence = self.search(query, top_k, &SearchFilter::new())?;
        Ok(self.validator.validate(steps, &evidence, mode)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::index::MemoryIndex;

    struct NullEmbedder;

    impl Embedder for NullEmbedder {
        fn embed_batch(
            &self,
            texts: &[&str],
        ) -> Result<Vec<Vec<f32>>, crate::embedding::EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn engine(config: EngineConfig) -> Result<EvidenceEngine, ConfigError> {
        EvidenceEngine::new(
            config,
            Arc::new(MemoryIndex::new(2)),
            Arc::new(NullEmbedder),
            Arc::new(MemoryAuditLog::new()),
        )
    }

    #[test]
    fn construction_validates_config() {
        assert!(engine(EngineConfig::default()).is_ok());

        let mut bad = EngineConfig::default();
        bad.sim_threshold = 2.0;
        assert!(matches!(
            engine(bad),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn empty_engine_searches_empty_and_refuses_strict() {
        let engine = engine(EngineConfig::default()).unwrap();
        let results = engine.search("anything", None, &SearchFilter::new()).unwrap();
        assert!(results.is_empty());

        let decision = engine
            .validate_answer("anything", &[CandidateStep::new("x = 4")], Mode::Strict, None)
            .unwrap();
        assert!(!decision.accepted);
    }
}
