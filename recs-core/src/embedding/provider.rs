//! Embedding provider trait and common result type.

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of a single embedding call, with optional provider metadata.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embedding vector.
    pub embedding: Vec<f32>,
    /// Model used for generation.
    pub model: String,
    /// Generation time in milliseconds, when the provider measures it.
    pub generation_time_ms: Option<u64>,
}

impl EmbeddingResult {
    pub fn new(embedding: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            embedding,
            model: model.into(),
            generation_time_ms: None,
        }
    }
}

/// Trait for providers that convert text to vectors.
///
/// Providers return raw model output; the service layer normalizes and
/// caches. Failures surface as [`crate::Error::Embedding`] and the
/// recommendation path degrades rather than erroring out.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, recorded alongside stored embeddings.
    fn model_name(&self) -> &str;

    /// Output dimension of this model.
    fn dimension(&self) -> usize;
}
