//! Engine configuration.
//!
//! All thresholds and multipliers live in an explicit [`EngineConfig`] value
//! that is passed into the indexer, retriever, and validator constructors.
//! Nothing in the algorithmic code reads ambient global state, so behavior is
//! reproducible under test with injected configurations. Out-of-range values
//! are rejected at construction time, not per request.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown validation mode: {0} (expected \"strict\" or \"prefer\")")]
    UnknownMode(String),

    #[error("unknown priority tag: {0}")]
    UnknownPriority(String),

    #[error("{name} must be within 0.0..=1.0, got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },

    #[error("boost multiplier {name} must be >= 1.0, got {value}")]
    InvalidMultiplier { name: &'static str, value: f32 },

    #[error(
        "high_confidence ({high_confidence}) must be >= sim_threshold ({sim_threshold}), \
         or High and Medium confidence would invert"
    )]
    ThresholdOrder {
        sim_threshold: f32,
        high_confidence: f32,
    },

    #[error("min_ngram_overlap must be >= 1")]
    InvalidNgramOverlap,

    #[error("top_k must be >= 1")]
    InvalidTopK,

    #[error("embedding dimensions must be >= 1")]
    InvalidDimensions,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Multiplicative score boosts applied during retrieval.
///
/// Each multiplier must be >= 1.0 so boosting can only promote, never demote,
/// a fragment relative to its raw similarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostTable {
    pub rubric: f32,
    pub slides: f32,
    pub textbook: f32,
    pub normal: f32,
    /// Applied on top of the priority multiplier when `trusted = true`.
    pub trusted: f32,
}

impl Default for BoostTable {
    fn default() -> Self {
        Self {
            rubric: 1.3,
            slides: 1.2,
            textbook: 1.1,
            normal: 1.0,
            trusted: 1.1,
        }
    }
}

impl BoostTable {
    /// Priority multiplier for a tag.
    pub fn priority_multiplier(&self, tag: crate::fragment::PriorityTag) -> f32 {
        use crate::fragment::PriorityTag::*;
        match tag {
            Rubric => self.rubric,
            Slides => self.slides,
            Textbook => self.textbook,
            Normal => self.normal,
        }
    }

    /// Trust multiplier: `trusted` for trusted fragments, 1.0 otherwise.
    pub fn trust_multiplier(&self, trusted: bool) -> f32 {
        if trusted {
            self.trusted
        } else {
            1.0
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("rubric", self.rubric),
            ("slides", self.slides),
            ("textbook", self.textbook),
            ("normal", self.normal),
            ("trusted", self.trusted),
        ] {
            if !value.is_finite() || value < 1.0 {
                return Err(ConfigError::InvalidMultiplier { name, value });
            }
        }
        Ok(())
    }
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_sim_threshold() -> f32 {
    0.78
}

fn default_high_confidence() -> f32 {
    0.85
}

fn default_min_ngram_overlap() -> usize {
    6
}

fn default_top_k() -> usize {
    10
}

/// Tunable parameters of the retrieval-and-validation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identifier of the embedding model. The same model must be used at
    /// index time and query time; a mismatch silently degrades ranking
    /// quality (documented limitation, not a runtime error).
    pub embedding_model: String,
    /// Fixed dimensionality of the vector index.
    pub dimensions: usize,
    /// Minimum cosine similarity for textual support.
    pub sim_threshold: f32,
    /// Similarity at or above which confidence is reported as High.
    pub high_confidence: f32,
    /// Minimum length (in tokens) of a shared contiguous token sequence
    /// required for textual support.
    pub min_ngram_overlap: usize,
    /// Default number of fragments returned by a search.
    pub top_k: usize,
    pub boosts: BoostTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_model: default_embedding_model(),
            dimensions: default_dimensions(),
            sim_threshold: default_sim_threshold(),
            high_confidence: default_high_confidence(),
            min_ngram_overlap: default_min_ngram_overlap(),
            top_k: default_top_k(),
            boosts: BoostTable::default(),
        }
    }
}

impl EngineConfig {
    /// Validate all fields, rejecting out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("sim_threshold", self.sim_threshold),
            ("high_confidence", self.high_confidence),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if self.high_confidence < self.sim_threshold {
            return Err(ConfigError::ThresholdOrder {
                sim_threshold: self.sim_threshold,
                high_confidence: self.high_confidence,
            });
        }
        if self.min_ngram_overlap == 0 {
            return Err(ConfigError::InvalidNgramOverlap);
        }
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        if self.dimensions == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        self.boosts.validate()
    }

    /// Load a YAML config file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}
