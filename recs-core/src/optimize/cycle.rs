//! The scheduled optimization cycle.
//!
//! Eight steps: learning-enable hint, cluster discovery, pattern
//! synthesis, reward aggregation, embedding drift, exploration decay,
//! quality measurement, and state checkpointing. Exactly one instance
//! runs at a time (store advisory lock); every step is atomic at the
//! storage layer, so a crash between steps leaves a state a later cycle
//! completes from.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::constants::{
    CENTROID_SHRINK_FACTOR, CLUSTER_MAX_PAIRS, CLUSTER_MIN_SIZE, CLUSTER_SIMILARITY_THRESHOLD,
    CYCLE_EXPLORATION_DECAY, FEEDBACK_WINDOW_DAYS, OPTIMIZATION_CYCLE_LOCK, QUALITY_SAMPLE_SIZE,
};
use crate::embedding::geometry::{cosine_similarity, l2_normalize};
use crate::error::{Error, Result};
use crate::learning::LearningEngine;
use crate::patterns::{PatternContext, PatternRegistry, RecommendationPattern, TaskType};
use crate::storage::StorageBackend;
use crate::types::{Content, SyncStatus};

use super::clusters::{mine_clusters, ContentCluster};

/// Rows sampled for cluster discovery.
const CLUSTER_SAMPLE_SIZE: usize = 200;

/// Metrics emitted by one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleMetrics {
    /// Embeddings rewritten by the drift step.
    pub total_optimized: usize,
    pub clusters_identified: usize,
    pub patterns_updated: usize,
    pub quality_score: f64,
    /// Delta against the prior cycle's quality score.
    pub quality_improvement: f64,
    pub search_speed_improvement: Option<f64>,
    pub best_strategy: String,
}

/// Background optimization job.
pub struct OptimizationCycle {
    storage: Arc<dyn StorageBackend>,
    registry: Arc<PatternRegistry>,
    learning: Arc<LearningEngine>,
    config: EngineConfig,
}

impl OptimizationCycle {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        registry: Arc<PatternRegistry>,
        learning: Arc<LearningEngine>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            registry,
            learning,
            config,
        }
    }

    /// Run one cycle. Returns `None` when another instance holds the
    /// advisory lock.
    pub async fn run(&self) -> Result<Option<CycleMetrics>> {
        if !self.storage.try_advisory_lock(OPTIMIZATION_CYCLE_LOCK).await? {
            info!("optimization cycle already running elsewhere; skipping");
            return Ok(None);
        }
        let outcome = self.run_locked().await;
        // Always release, even when a step failed.
        if let Err(e) = self.storage.release_advisory_lock(OPTIMIZATION_CYCLE_LOCK).await {
            warn!(error = %e, "failed to release optimization cycle lock");
        }
        outcome.map(Some)
    }

    async fn run_locked(&self) -> Result<CycleMetrics> {
        let started = Utc::now();
        info!("optimization cycle starting");

        // Step 1: idempotent hint that this cycle may rewrite content
        // embeddings; verifies the ANN indexes while at it.
        self.storage
            .index_maintenance()
            .await
            .map_err(|e| Error::Optimization(format!("index maintenance: {e}")))?;

        // Step 2: cluster discovery over a sample of embedded rows.
        let sample = self
            .storage
            .list_content_with_embeddings(CLUSTER_SAMPLE_SIZE)
            .await
            .map_err(|e| Error::Optimization(format!("cluster sample: {e}")))?;
        let clusters = mine_clusters(
            &sample,
            CLUSTER_SIMILARITY_THRESHOLD,
            CLUSTER_MAX_PAIRS,
            CLUSTER_MIN_SIZE,
        );
        info!(clusters = clusters.len(), sampled = sample.len(), "cluster discovery done");

        // Step 3: synthesize patterns from multi-genre clusters.
        let patterns_updated = self
            .synthesize_patterns(&clusters)
            .await
            .map_err(|e| Error::Optimization(format!("pattern synthesis: {e}")))?;

        // Step 4: aggregate rewards by primary genre over the recent
        // feedback window (bounded at 7 days, floored at the previous
        // cycle's checkpoint so an idle catalog stays untouched).
        let best_genre = self
            .aggregate_rewards(started)
            .await
            .map_err(|e| Error::Optimization(format!("reward aggregation: {e}")))?;
        let best_strategy = best_genre
            .as_ref()
            .map_or_else(|| "none".to_string(), |g| format!("genre_{g}"));

        // Step 5: drift the best genre's embeddings toward their
        // centroid. Atomic in one storage call.
        let total_optimized = match &best_genre {
            Some(genre) => self
                .drift_genre_embeddings(genre)
                .await
                .map_err(|e| Error::Optimization(format!("embedding drift: {e}")))?,
            None => 0,
        };

        // Step 6: exploration decay.
        self.learning.scale_exploration(CYCLE_EXPLORATION_DECAY);

        // Step 7: quality measurement.
        let quality_score = self
            .measure_quality()
            .await
            .map_err(|e| Error::Optimization(format!("quality measurement: {e}")))?;
        let prior_quality = self
            .storage
            .last_sync_status("learning_state")
            .await?
            .and_then(|s| s.metadata.get("quality_score").and_then(|v| v.as_f64()))
            .unwrap_or(quality_score);

        // Step 8: checkpoint.
        let stats = self.learning.stats();
        let completed = Utc::now();
        let status = SyncStatus {
            sync_type: "learning_state".to_string(),
            last_sync_timestamp: completed.timestamp(),
            items_synced: total_optimized as i64,
            status: "completed".to_string(),
            metadata: serde_json::json!({
                "episode": stats.episodes,
                "total_reward": stats.total_reward,
                "exploration_rate": stats.exploration_rate,
                "best_strategy": best_strategy,
                "quality_score": quality_score,
                "completed_at": completed.to_rfc3339(),
            }),
            created_at: completed,
        };
        self.storage
            .write_sync_status(&status)
            .await
            .map_err(|e| Error::Optimization(format!("state persistence: {e}")))?;

        let metrics = CycleMetrics {
            total_optimized,
            clusters_identified: clusters.len(),
            patterns_updated,
            quality_score,
            quality_improvement: quality_score - prior_quality,
            search_speed_improvement: None,
            best_strategy,
        };
        info!(
            clusters = metrics.clusters_identified,
            patterns = metrics.patterns_updated,
            optimized = metrics.total_optimized,
            quality = metrics.quality_score,
            "optimization cycle completed"
        );
        Ok(metrics)
    }

    /// Upsert a custom pattern per cluster spanning at least two
    /// primary genres. Idempotent on the approach text.
    async fn synthesize_patterns(&self, clusters: &[ContentCluster]) -> Result<usize> {
        let mut updated = 0;
        for cluster in clusters {
            if cluster.genres.len() < 2 {
                continue;
            }
            let approach = format!(
                "Cluster-based recommendation for {} + {}",
                cluster.genres[0], cluster.genres[1]
            );
            let mut pattern = RecommendationPattern::new(
                TaskType::Custom,
                approach,
                PatternContext {
                    top_genres: cluster.genres.iter().take(3).cloned().collect(),
                    ..PatternContext::any()
                },
            );
            pattern.success_rate = (0.7 + 0.2 * cluster.avg_similarity).clamp(0.0, 1.0);
            pattern.total_uses = cluster.size() as u64;
            self.registry.upsert(pattern).await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Group the recent feedback window's rewards by the content's
    /// primary genre; return the best-rewarded genre.
    async fn aggregate_rewards(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> Result<Option<String>> {
        let window_floor = now - Duration::days(FEEDBACK_WINDOW_DAYS);
        let since = match self.storage.last_sync_status("learning_state").await? {
            Some(previous) => previous.created_at.max(window_floor),
            None => window_floor,
        };
        let feedback = self.storage.read_feedback_window(since, now).await?;
        if feedback.is_empty() {
            return Ok(None);
        }

        let ids: Vec<String> = feedback.iter().map(|f| f.content_id.clone()).collect();
        let contents = self.storage.get_content_batch(&ids).await?;
        let primary: HashMap<&str, &str> = contents
            .iter()
            .filter_map(|c| c.primary_genre().map(|g| (c.id.as_str(), g)))
            .collect();

        let mut per_genre: HashMap<String, (f64, u64)> = HashMap::new();
        for row in &feedback {
            let Some(genre) = primary.get(row.content_id.as_str()) else {
                continue;
            };
            let entry = per_genre.entry((*genre).to_string()).or_insert((0.0, 0));
            entry.0 += f64::from(row.reward);
            entry.1 += 1;
        }

        let best = per_genre
            .into_iter()
            .filter(|(_, (_, count))| *count > 0)
            .max_by(|a, b| {
                let avg_a = a.1 .0 / a.1 .1 as f64;
                let avg_b = b.1 .0 / b.1 .1 as f64;
                avg_a
                    .partial_cmp(&avg_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // Stable tie-break by genre name.
                    .then_with(|| b.0.cmp(&a.0))
            })
            .map(|(genre, _)| genre);
        Ok(best)
    }

    /// Shrink the best genre's member embeddings toward their centroid
    /// and re-normalize. Other embeddings are untouched.
    async fn drift_genre_embeddings(&self, genre: &str) -> Result<usize> {
        let rows = self
            .storage
            .list_content_with_embeddings(usize::MAX)
            .await?;
        let members: Vec<&Content> = rows
            .iter()
            .filter(|c| c.primary_genre() == Some(genre))
            .collect();
        if members.len() < 2 {
            return Ok(0);
        }

        let dimension = self.config.embedding_dimension;
        let mut centroid = vec![0.0f32; dimension];
        for member in &members {
            if let Some(embedding) = &member.embedding {
                for (acc, value) in centroid.iter_mut().zip(embedding.iter()) {
                    *acc += value;
                }
            }
        }
        let centroid = l2_normalize(&centroid);

        let updates: Vec<(String, Vec<f32>)> = members
            .iter()
            .filter_map(|member| {
                member.embedding.as_ref().map(|embedding| {
                    let drifted: Vec<f32> = embedding
                        .iter()
                        .zip(centroid.iter())
                        .map(|(e, c)| e * (1.0 - CENTROID_SHRINK_FACTOR) + c * CENTROID_SHRINK_FACTOR)
                        .collect();
                    (member.id.clone(), l2_normalize(&drifted))
                })
            })
            .collect();
        self.storage.update_content_embeddings(&updates).await?;
        Ok(updates.len())
    }

    /// Average intra-primary-genre pairwise similarity over a sample.
    async fn measure_quality(&self) -> Result<f64> {
        let sample = self
            .storage
            .list_content_with_embeddings(QUALITY_SAMPLE_SIZE)
            .await?;
        let mut by_genre: HashMap<&str, Vec<&Vec<f32>>> = HashMap::new();
        for row in &sample {
            if let (Some(genre), Some(embedding)) = (row.primary_genre(), row.embedding.as_ref()) {
                by_genre.entry(genre).or_default().push(embedding);
            }
        }

        let mut genre_means = Vec::new();
        for embeddings in by_genre.values() {
            if embeddings.len() < 2 {
                continue;
            }
            let (mut sum, mut pairs) = (0.0f64, 0u64);
            for a in 0..embeddings.len() {
                for b in (a + 1)..embeddings.len() {
                    sum += f64::from(cosine_similarity(embeddings[a], embeddings[b]));
                    pairs += 1;
                }
            }
            genre_means.push(sum / pairs as f64);
        }
        if genre_means.is_empty() {
            return Ok(0.0);
        }
        Ok(genre_means.iter().sum::<f64>() / genre_means.len() as f64)
    }
}
