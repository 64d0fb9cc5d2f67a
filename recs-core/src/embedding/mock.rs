//! Deterministic hash-seeded embedding model.
//!
//! Produces unit-norm vectors that are stable per input string but carry
//! no semantic signal. Used by tests and as the documented last-resort
//! fallback when no real provider is configured.

use async_trait::async_trait;

use super::geometry::l2_normalize;
use super::provider::EmbeddingModel;
use crate::error::Result;

/// Hash-PRNG embedding model.
pub struct MockEmbeddingModel {
    name: String,
    dimension: usize,
}

impl MockEmbeddingModel {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            name: "mock-hash".to_string(),
            dimension,
        }
    }

    /// Generate a deterministic embedding from the text's hash.
    #[must_use]
    pub fn generate(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            let value = ((seed >> 24) & 0xFFFF) as f32 / 32_768.0 - 1.0;
            embedding.push(value);
        }
        l2_normalize(&embedding)
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate(text))
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::geometry::l2_norm;

    #[test]
    fn embeddings_are_deterministic() {
        let model = MockEmbeddingModel::new(384);
        assert_eq!(model.generate("breaking bad"), model.generate("breaking bad"));
        assert_ne!(model.generate("breaking bad"), model.generate("the wire"));
    }

    #[test]
    fn embeddings_are_unit_norm() {
        let model = MockEmbeddingModel::new(384);
        let v = model.generate("some catalog text");
        assert_eq!(v.len(), 384);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-4);
    }
}
