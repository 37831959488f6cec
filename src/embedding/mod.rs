//! Embedding backend seam.
//!
//! The engine never talks to an embedding model directly. It depends on the
//! [`Embedder`] trait so production code can use fastembed-rs (behind the
//! `embeddings` feature) while tests inject deterministic embedders. The same
//! embedder instance must be shared between indexing and querying.

use thiserror::Error;

/// Errors raised by an embedding backend.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embedding model returned no results.
    #[error("embedding returned no results")]
    EmptyResult,

    /// Model loading or inference failed.
    #[error("embedding model error: {0}")]
    Model(String),
}

/// Trait for embedding text into fixed-length vectors.
///
/// Implementations handle model loading and inference. The engine treats
/// their latency as opaque: no timeout or retry logic lives in this crate.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResult)
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

// ---------------------------------------------------------------------------
// FastEmbedEmbedder — production embedder behind `embeddings` feature
// ---------------------------------------------------------------------------

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, EmbeddingError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production embedder backed by fastembed (ONNX Runtime).
    ///
    /// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed`
    /// method requires `&mut self`, while the `Embedder` trait uses `&self`.
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
    }

    impl FastEmbedEmbedder {
        /// Create a new FastEmbedEmbedder with a specific model.
        pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::Model(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
            })
        }

        /// Create a new FastEmbedEmbedder with the default model
        /// (all-MiniLM-L6-v2, 384 dimensions).
        pub fn default_model() -> Result<Self, EmbeddingError> {
            Self::new(EmbeddingModel::AllMiniLML6V2)
        }

        /// Resolve a configured model name to a fastembed model.
        pub fn from_name(name: &str) -> Result<Self, EmbeddingError> {
            let model = match name {
                "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
                "all-MiniLM-L12-v2" => EmbeddingModel::AllMiniLML12V2,
                "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
                other => {
                    return Err(EmbeddingError::Model(format!(
                        "unknown embedding model: {other}"
                    )))
                }
            };
            Self::new(model)
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self.model.lock().unwrap();
            let embeddings = model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::Model(e.to_string()))?;
            if embeddings.is_empty() {
                return Err(EmbeddingError::EmptyResult);
            }
            Ok(embeddings)
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_correct() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6, "identical vectors");

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6, "orthogonal vectors");

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 1e-6, "opposite vectors");
    }

    #[test]
    fn cosine_similarity_zero_vector() {
        let a = vec![1.0, 0.0, 0.0];
        let zero = vec![0.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &zero), 0.0);
    }

    #[test]
    fn embed_one_surfaces_empty_result() {
        struct EmptyEmbedder;
        impl Embedder for EmptyEmbedder {
            fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
                Ok(Vec::new())
            }
        }
        assert!(matches!(
            EmptyEmbedder.embed_one("anything"),
            Err(EmbeddingError::EmptyResult)
        ));
    }

    #[cfg(feature = "embeddings")]
    #[test]
    #[ignore] // requires model download
    fn fastembed_default_model_embeds_text() {
        let embedder = FastEmbedEmbedder::default_model().expect("model should load");
        let result = embedder.embed_batch(&["hello world"]).expect("should embed");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), 384);
    }
}
