//! Process-wide engine handle.
//!
//! One [`RecsEngine`] owns the storage client, the embedding service,
//! the pattern registry, both engines, and the cycle scheduler. Nothing
//! is shared across processes by in-memory means; replicas coordinate
//! through the store.

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::embedding::{EmbeddingModel, EmbeddingService};
use crate::learning::LearningEngine;
use crate::optimize::{CycleScheduler, OptimizationCycle};
use crate::patterns::PatternRegistry;
use crate::recommend::RecommendationEngine;
use crate::reflexion::ReflexionMemory;
use crate::storage::{MemoryStorage, StorageBackend};
use crate::Result;

/// Owner of every long-lived component.
pub struct RecsEngine {
    config: EngineConfig,
    storage: Arc<dyn StorageBackend>,
    embeddings: Arc<EmbeddingService>,
    registry: Arc<PatternRegistry>,
    recommendations: Arc<RecommendationEngine>,
    learning: Arc<LearningEngine>,
    cycle: Arc<OptimizationCycle>,
    reflexion: Arc<ReflexionMemory>,
}

impl RecsEngine {
    /// Wire the engine over an arbitrary backend and embedding model.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        model: Arc<dyn EmbeddingModel>,
        config: EngineConfig,
    ) -> Self {
        let embeddings = Arc::new(EmbeddingService::new(
            model,
            config.embedding_cache_entries,
            Duration::from_secs(config.embedding_cache_ttl_secs),
        ));
        let registry = Arc::new(PatternRegistry::new(
            Arc::clone(&storage),
            Arc::clone(&embeddings),
        ));
        let recommendations = Arc::new(RecommendationEngine::new(
            Arc::clone(&storage),
            Arc::clone(&registry),
            config.clone(),
        ));
        let learning = Arc::new(LearningEngine::new(
            Arc::clone(&storage),
            Arc::clone(&registry),
            config.clone(),
        ));
        let cycle = Arc::new(OptimizationCycle::new(
            Arc::clone(&storage),
            Arc::clone(&registry),
            Arc::clone(&learning),
            config.clone(),
        ));
        let reflexion = Arc::new(ReflexionMemory::new(
            Arc::clone(&storage),
            Arc::clone(&embeddings),
        ));
        Self {
            config,
            storage,
            embeddings,
            registry,
            recommendations,
            learning,
            cycle,
            reflexion,
        }
    }

    /// Engine over the in-memory backend and the deterministic mock
    /// embedding model.
    #[must_use]
    pub fn in_memory(config: EngineConfig) -> Self {
        let dimension = config.embedding_dimension;
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(crate::embedding::MockEmbeddingModel::new(dimension)),
            config,
        )
    }

    /// Seed patterns, verify indexes, and restore persisted learning
    /// state. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        self.config.validate()?;
        self.storage.index_maintenance().await?;
        self.registry.ensure_seeded().await?;
        self.learning.load_persisted().await?;
        Ok(())
    }

    /// Spawn the daily optimization schedule.
    pub fn start_scheduler(&self) -> tokio::task::JoinHandle<()> {
        let (hour, minute) = self.config.consolidation_time();
        CycleScheduler::new(Arc::clone(&self.cycle), hour, minute).spawn()
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    pub fn registry(&self) -> &Arc<PatternRegistry> {
        &self.registry
    }

    pub fn recommendations(&self) -> &Arc<RecommendationEngine> {
        &self.recommendations
    }

    pub fn learning(&self) -> &Arc<LearningEngine> {
        &self.learning
    }

    pub fn cycle(&self) -> &Arc<OptimizationCycle> {
        &self.cycle
    }

    pub fn reflexion(&self) -> &Arc<ReflexionMemory> {
        &self.reflexion
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let engine = RecsEngine::in_memory(EngineConfig::default());
        engine.initialize().await.unwrap();
        engine.initialize().await.unwrap();
        let stats = engine.registry().stats().await.unwrap();
        assert_eq!(stats.total_patterns, 5);
    }
}
