//! # Embedding Layer
//!
//! Text-to-vector conversion with caching, plus the vector geometry the
//! rest of the engine builds on.
//!
//! The service wraps a provider ([`EmbeddingModel`]) and guarantees that
//! every vector it hands out is unit-norm, regardless of what the model
//! returned. Results are cached in an LRU keyed by the exact input
//! string, with a TTL.
//!
//! Failure modes propagate as [`crate::Error::Embedding`]; the
//! recommendation path degrades by skipping semantic features and using
//! lexical/popularity fallbacks.

pub mod geometry;
mod mock;
mod provider;
pub mod quantize;
#[cfg(feature = "remote")]
mod remote;

pub use mock::MockEmbeddingModel;
pub use provider::{EmbeddingModel, EmbeddingResult};
#[cfg(feature = "remote")]
pub use remote::RemoteEmbeddingModel;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::retrieval::CacheMetrics;

/// Default cache capacity when the configured value is zero.
const FALLBACK_CACHE_CAPACITY: usize = 16;

struct CachedEmbedding {
    vector: Vec<f32>,
    inserted: Instant,
}

struct CacheInner {
    entries: LruCache<String, CachedEmbedding>,
    metrics: CacheMetrics,
}

/// Embedding service: provider + normalization + LRU/TTL cache.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingModel>,
    cache: Mutex<CacheInner>,
    ttl: Duration,
    dimension: usize,
}

impl EmbeddingService {
    /// Create a service over the given provider.
    pub fn new(provider: Arc<dyn EmbeddingModel>, cache_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(cache_entries)
            .or(NonZeroUsize::new(FALLBACK_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        let dimension = provider.dimension();
        Self {
            provider,
            cache: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                metrics: CacheMetrics::default(),
            }),
            ttl,
            dimension,
        }
    }

    /// Service backed by the deterministic mock model; for tests and
    /// cold deployments with no provider configured.
    pub fn mock(dimension: usize) -> Self {
        Self::new(
            Arc::new(MockEmbeddingModel::new(dimension)),
            1000,
            Duration::from_secs(3600),
        )
    }

    /// Output dimension of the underlying model.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a single text, returning a unit-norm vector.
    ///
    /// Cache hits are served without touching the provider; expired
    /// entries are treated as misses.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache_get(text) {
            return Ok(hit);
        }
        let raw = self.provider.embed_text(text).await?;
        if raw.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "model {} returned {} dims, expected {}",
                self.provider.model_name(),
                raw.len(),
                self.dimension
            )));
        }
        let normalized = geometry::l2_normalize(&raw);
        self.cache_put(text, normalized.clone());
        Ok(normalized)
    }

    /// Embed a batch with bounded parallelism, preserving input order.
    ///
    /// Each entry gets its own result; a failure in one entry never
    /// loses its neighbors' vectors.
    pub async fn embed_batch(&self, texts: &[String], parallelism: usize) -> Vec<Result<Vec<f32>>> {
        let parallelism = parallelism.max(1);
        stream::iter(texts.iter())
            .map(|text| self.embed(text))
            .buffered(parallelism)
            .collect()
            .await
    }

    /// Cosine similarity of two texts through the provider.
    pub async fn text_similarity(&self, a: &str, b: &str) -> Result<f32> {
        let ea = self.embed(a).await?;
        let eb = self.embed(b).await?;
        Ok(geometry::cosine_similarity(&ea, &eb))
    }

    /// Cache hit/miss counters.
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.lock().metrics.clone()
    }

    fn cache_get(&self, text: &str) -> Option<Vec<f32>> {
        let mut inner = self.cache.lock();
        match inner.entries.get(text) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                let vector = entry.vector.clone();
                inner.metrics.hits += 1;
                Some(vector)
            }
            Some(_) => {
                inner.entries.pop(text);
                inner.metrics.evictions += 1;
                inner.metrics.misses += 1;
                None
            }
            None => {
                inner.metrics.misses += 1;
                None
            }
        }
    }

    fn cache_put(&self, text: &str, vector: Vec<f32>) {
        let mut inner = self.cache.lock();
        if inner.entries.len() == usize::from(inner.entries.cap()) {
            inner.metrics.evictions += 1;
        }
        inner.entries.put(
            text.to_string(),
            CachedEmbedding {
                vector,
                inserted: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::geometry::l2_norm;

    #[tokio::test]
    async fn embed_is_unit_norm_and_cached() {
        let service = EmbeddingService::mock(384);
        let v1 = service.embed("the sopranos").await.unwrap();
        assert!((l2_norm(&v1) - 1.0).abs() < 1e-4);

        let v2 = service.embed("the sopranos").await.unwrap();
        assert_eq!(v1, v2);
        let metrics = service.cache_metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let service = EmbeddingService::mock(64);
        let texts: Vec<String> = (0..10).map(|i| format!("title {i}")).collect();
        let results = service.embed_batch(&texts, 4).await;
        assert_eq!(results.len(), texts.len());
        for (text, result) in texts.iter().zip(results.iter()) {
            let direct = service.embed(text).await.unwrap();
            assert_eq!(result.as_ref().unwrap(), &direct);
        }
    }

    #[tokio::test]
    async fn text_similarity_is_symmetric() {
        let service = EmbeddingService::mock(128);
        let ab = service.text_similarity("drama series", "crime drama").await.unwrap();
        let ba = service.text_similarity("crime drama", "drama series").await.unwrap();
        assert!((ab - ba).abs() < 1e-6);
    }
}
