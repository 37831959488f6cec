//! Per-step evidence validation and answer policy.
//!
//! Each candidate step is checked against retrieved evidence two ways:
//! symbolically (algebraic equivalence of extracted expressions) and
//! textually (embedding similarity gated by a shared token run). Symbolic
//! support wins when both hold. The policy layer then turns per-step
//! verdicts into an accept/refuse decision.

pub mod symbolic;
pub mod textual;

use crate::audit::{AuditError, AuditRecord, AuditSink, ValidationRecord};
use crate::config::{ConfigError, EngineConfig};
use crate::embedding::{cosine_similarity, Embedder, EmbeddingError};
use crate::fragment::{CandidateStep, FragmentId};
use crate::retrieve::RetrievedFragment;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// The exact refusal emitted when strict mode rejects an answer.
pub const REFUSAL_MESSAGE: &str = "No supported solution found in resources.";

/// Errors raised during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
}

/// Enforcement mode for the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every step must be supported or the answer is refused.
    Strict,
    /// Unsupported steps are flagged but the answer is still returned.
    Prefer,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Mode::Strict),
            "prefer" => Ok(Mode::Prefer),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// How a step was matched to evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Symbolic,
    Textual,
    None,
}

/// Confidence tier for a per-step verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Verdict for one candidate step.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// Index of the step in the caller's input, blanks included.
    pub step_index: usize,
    pub supported: bool,
    pub method: Method,
    pub confidence: Confidence,
    /// Best embedding similarity against the evidence set.
    pub similarity: f32,
    pub matched_fragment_id: Option<FragmentId>,
}

/// The policy outcome over a full set of step verdicts.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub mode: Mode,
    pub accepted: bool,
    pub results: Vec<ValidationResult>,
    /// Set exactly when `accepted` is false.
    pub refusal_reason: Option<String>,
}

impl Decision {
    pub fn supported_count(&self) -> usize {
        self.results.iter().filter(|r| r.supported).count()
    }

    pub fn total_steps(&self) -> usize {
        self.results.len()
    }
}

/// Turn per-step verdicts into an accept/refuse decision.
///
/// Strict mode requires at least one evaluated step and support for every
/// one of them. Prefer mode always accepts; callers surface the per-step
/// flags instead.
pub fn apply_policy(mode: Mode, results: Vec<ValidationResult>) -> Decision {
    let accepted = match mode {
        Mode::Strict => !results.is_empty() && results.iter().all(|r| r.supported),
        Mode::Prefer => true,
    };
    Decision {
        mode,
        accepted,
        results,
        refusal_reason: (!accepted).then(|| REFUSAL_MESSAGE.to_string()),
    }
}

/// Validates candidate steps against retrieved evidence.
pub struct StepValidator {
    embedder: Arc<dyn Embedder>,
    audit: Arc<dyn AuditSink>,
    sim_threshold: f32,
    high_confidence: f32,
    min_ngram_overlap: usize,
}

impl StepValidator {
    pub fn new(
        config: &EngineConfig,
        embedder: Arc<dyn Embedder>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            embedder,
            audit,
            sim_threshold: config.sim_threshold,
            high_confidence: config.high_confidence,
            min_ngram_overlap: config.min_ngram_overlap,
        }
    }

    /// Validate every non-blank step against the evidence set and apply the
    /// given mode. Blank steps are skipped but original indices are kept.
    pub fn validate(
        &self,
        steps: &[CandidateStep],
        evidence: &[RetrievedFragment],
        mode: Mode,
    ) -> Result<Decision, ValidateError> {
        let indexed_steps: Vec<(usize, &CandidateStep)> = steps
            .iter()
            .enumerate()
            .filter(|(_, step)| !step.text.trim().is_empty())
            .collect();

        let step_vectors = self.embed_texts(
            indexed_steps.iter().map(|(_, s)| s.text.as_str()),
            evidence.is_empty() || indexed_steps.is_empty(),
        )?;
        let fragment_vectors = self.embed_texts(
            evidence.iter().map(|e| e.fragment.text.as_str()),
            evidence.is_empty() || indexed_steps.is_empty(),
        )?;

        let fragment_expressions: Vec<Vec<String>> = evidence
            .iter()
            .map(|e| symbolic::extract_expressions(&e.fragment.text))
            .collect();
        let fragment_tokens: Vec<Vec<String>> = evidence
            .iter()
            .map(|e| textual::tokenize(&e.fragment.text))
            .collect();

        let mut results = Vec::with_capacity(indexed_steps.len());
        for (position, (step_index, step)) in indexed_steps.iter().enumerate() {
            let result = self.validate_step(
                *step_index,
                step,
                step_vectors.get(position).map(Vec::as_slice),
                evidence,
                &fragment_vectors,
                &fragment_expressions,
                &fragment_tokens,
            );
            debug!(
                step_index = result.step_index,
                supported = result.supported,
                method = ?result.method,
                similarity = result.similarity,
                "validated step"
            );
            results.push(result);
        }

        let decision = apply_policy(mode, results);
        self.audit
            .append(&AuditRecord::Validation(ValidationRecord {
                timestamp: chrono::Utc::now(),
                mode,
                accepted: decision.accepted,
                total_steps: decision.total_steps(),
                supported_steps: decision.supported_count(),
                results: decision.results.clone(),
            }))?;
        Ok(decision)
    }

    fn embed_texts<'a>(
        &self,
        texts: impl Iterator<Item = &'a str>,
        skip: bool,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let texts: Vec<&str> = texts.collect();
        if skip || texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embedder.embed_batch(&texts)
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_step(
        &self,
        step_index: usize,
        step: &CandidateStep,
        step_vector: Option<&[f32]>,
        evidence: &[RetrievedFragment],
        fragment_vectors: &[Vec<f32>],
        fragment_expressions: &[Vec<String>],
        fragment_tokens: &[Vec<String>],
    ) -> ValidationResult {
        // Best embedding match across the evidence set
        let best = step_vector.and_then(|vector| {
            fragment_vectors
                .iter()
                .map(|fv| cosine_similarity(vector, fv))
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
        });
        let similarity = best.map(|(_, sim)| sim).unwrap_or(0.0);

        let step_expressions = symbolic::extract_expressions(&step.text);
        let symbolic_match = fragment_expressions
            .iter()
            .position(|exprs| symbolic::find_match(&step_expressions, exprs).is_some());

        if let Some(fragment_index) = symbolic_match {
            return ValidationResult {
                step_index,
                supported: true,
                method: Method::Symbolic,
                confidence: Confidence::High,
                similarity,
                matched_fragment_id: Some(evidence[fragment_index].fragment.id.clone()),
            };
        }

        if let Some((best_index, best_sim)) = best {
            let step_tokens = textual::tokenize(&step.text);
            let textual_support = best_sim >= self.sim_threshold
                && textual::has_shared_ngram(
                    &step_tokens,
                    &fragment_tokens[best_index],
                    self.min_ngram_overlap,
                );
            if textual_support {
                let confidence = if best_sim >= self.high_confidence {
                    Confidence::High
                } else {
                    Confidence::Medium
                };
                return ValidationResult {
                    step_index,
                    supported: true,
                    method: Method::Textual,
                    confidence,
                    similarity: best_sim,
                    matched_fragment_id: Some(evidence[best_index].fragment.id.clone()),
                };
            }
            // Unsupported, but record the closest candidate for the audit trail
            return ValidationResult {
                step_index,
                supported: false,
                method: Method::None,
                confidence: Confidence::Low,
                similarity: best_sim,
                matched_fragment_id: Some(evidence[best_index].fragment.id.clone()),
            };
        }

        ValidationResult {
            step_index,
            supported: false,
            method: Method::None,
            confidence: Confidence::Low,
            similarity,
            matched_fragment_id: None,
        }
    }
}
