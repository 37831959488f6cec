//! Veridex: retrieval-and-validation engine for document-grounded QA
//!
//! Indexes document fragments as vectors with priority and trust metadata,
//! serves deterministic boosted similarity search, and validates candidate
//! solution steps against retrieved evidence both textually (embedding
//! similarity gated by shared token runs) and symbolically (algebraic
//! equivalence of extracted expressions). A policy layer turns per-step
//! verdicts into an accept/refuse decision; strict mode refuses any answer
//! with an unsupported step.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use veridex::{EngineConfig, EvidenceEngine, MemoryAuditLog, MemoryIndex};
//!
//! # fn embedder() -> Arc<dyn veridex::Embedder> { unimplemented!() }
//! let config = EngineConfig::default();
//! let index = Arc::new(MemoryIndex::new(config.dimensions));
//! let audit = Arc::new(MemoryAuditLog::new());
//! let engine = EvidenceEngine::new(config, index, embedder(), audit).unwrap();
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod embedding;
pub mod fragment;
pub mod index;
pub mod retrieve;
pub mod validate;

pub use api::{EngineError, EvidenceEngine};
pub use audit::{AuditError, AuditRecord, AuditSink, JsonlAuditLog, MemoryAuditLog};
pub use config::{BoostTable, ConfigError, EngineConfig};
pub use embedding::{cosine_similarity, Embedder, EmbeddingError};
pub use fragment::{CandidateStep, Fragment, FragmentId, PriorityTag};
pub use index::{
    FragmentIndex, IndexError, IndexResult, IndexStats, Indexer, MemoryIndex, SearchFilter,
    SqliteIndex,
};
pub use retrieve::{format_evidence, RetrievedFragment, Retriever, RetrieveError};
pub use validate::{
    apply_policy, Confidence, Decision, Method, Mode, StepValidator, ValidateError,
    ValidationResult, REFUSAL_MESSAGE,
};

#[cfg(feature = "embeddings")]
pub use embedding::FastEmbedEmbedder;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
