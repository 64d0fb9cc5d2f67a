//! # Reflexion Memory
//!
//! Append-only episode store with self-critique, plus consolidation of
//! high-reward episodes into reusable skill records. Episodes carry a
//! derived embedding so retrieval is semantic; low-reward episodes are
//! retained deliberately to learn from failure.

mod skills;

pub use skills::{consolidate_skills, Skill};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingService;
use crate::storage::{SearchFilter, StorageBackend, VectorTable};
use crate::Result;

/// One recorded episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflexionEpisode {
    /// Store-assigned id; 0 until persisted.
    pub id: i64,
    pub session_id: String,
    pub task: String,
    pub action: String,
    pub reward: f32,
    pub success: bool,
    /// Self-generated critique of the outcome.
    pub critique: String,
    /// Ordered list of extracted lessons.
    pub learnings: Vec<String>,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Input for [`ReflexionMemory::store_episode`].
#[derive(Debug, Clone)]
pub struct EpisodeInput {
    pub session_id: String,
    pub task: String,
    pub action: String,
    pub reward: f32,
    pub success: bool,
    pub critique: Option<String>,
    pub learnings: Vec<String>,
}

/// Retrieval query with optional post-filters.
#[derive(Debug, Clone)]
pub struct EpisodeQuery {
    pub task: String,
    pub k: usize,
    pub only_success: bool,
    pub min_reward: Option<f32>,
    pub max_reward: Option<f32>,
    pub session_id: Option<String>,
}

impl EpisodeQuery {
    pub fn new(task: impl Into<String>, k: usize) -> Self {
        Self {
            task: task.into(),
            k,
            only_success: false,
            min_reward: None,
            max_reward: None,
            session_id: None,
        }
    }
}

/// TTL pruning policy; at least `keep_min_per_task` episodes survive
/// per distinct task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodePrunePolicy {
    pub min_reward: f32,
    pub max_age_days: i64,
    pub keep_min_per_task: usize,
}

impl Default for EpisodePrunePolicy {
    fn default() -> Self {
        Self {
            min_reward: -1.0,
            max_age_days: 90,
            keep_min_per_task: 3,
        }
    }
}

/// Episode store with embedding-based retrieval.
pub struct ReflexionMemory {
    storage: Arc<dyn StorageBackend>,
    embeddings: Arc<EmbeddingService>,
}

impl ReflexionMemory {
    pub fn new(storage: Arc<dyn StorageBackend>, embeddings: Arc<EmbeddingService>) -> Self {
        Self { storage, embeddings }
    }

    /// Append an episode. The embedding derives from the context, action
    /// and outcome; a missing critique is generated from the outcome.
    pub async fn store_episode(&self, input: EpisodeInput) -> Result<i64> {
        let outcome = if input.success { "ok" } else { "fail" };
        let text = format!("{} {} {}", input.task, input.action, outcome);
        let embedding = self.embeddings.embed(&text).await?;

        let critique = input
            .critique
            .unwrap_or_else(|| generate_critique(&input.task, &input.action, input.success, input.reward));

        let episode = ReflexionEpisode {
            id: 0,
            session_id: input.session_id,
            task: input.task,
            action: input.action,
            reward: input.reward,
            success: input.success,
            critique,
            learnings: input.learnings,
            embedding,
            created_at: Utc::now(),
        };
        self.storage.insert_reflexion_episode(&episode).await
    }

    /// K nearest episodes by embedding similarity, post-filtered.
    pub async fn retrieve_relevant(&self, query: &EpisodeQuery) -> Result<Vec<ReflexionEpisode>> {
        let query_embedding = self.embeddings.embed(&query.task).await?;
        // Over-fetch so post-filters do not starve the result set.
        let hits = self
            .storage
            .vector_search(
                VectorTable::ReflexionEpisodes,
                &query_embedding,
                query.k * 4,
                &SearchFilter::default(),
            )
            .await?;

        let all = self.storage.list_reflexion_episodes().await?;
        let mut selected = Vec::new();
        for (id, _) in hits {
            let Ok(id) = id.parse::<i64>() else { continue };
            let Some(episode) = all.iter().find(|e| e.id == id) else {
                continue;
            };
            if query.only_success && !episode.success {
                continue;
            }
            if query.min_reward.is_some_and(|m| episode.reward < m) {
                continue;
            }
            if query.max_reward.is_some_and(|m| episode.reward > m) {
                continue;
            }
            if query
                .session_id
                .as_ref()
                .is_some_and(|s| &episode.session_id != s)
            {
                continue;
            }
            selected.push(episode.clone());
            if selected.len() >= query.k {
                break;
            }
        }
        Ok(selected)
    }

    /// Apply the TTL pruning policy.
    pub async fn prune_episodes(&self, policy: &EpisodePrunePolicy) -> Result<usize> {
        self.storage.prune_reflexion_episodes(policy).await
    }

    /// Project repeated high-reward episodes into the skill catalog.
    ///
    /// Returns how many skills were written. Skills never feed the
    /// recommendation pipeline; the optimization cycle may read them as
    /// side information.
    pub async fn consolidate(&self, min_reward: f32, min_occurrences: usize) -> Result<usize> {
        let episodes = self.storage.list_reflexion_episodes().await?;
        let skills = consolidate_skills(&episodes, min_reward, min_occurrences);
        for skill in &skills {
            self.storage.upsert_skill(skill).await?;
        }
        Ok(skills.len())
    }

    /// Drop skills that neither succeed nor get used.
    pub async fn prune_skills(&self, min_success_rate: f32, min_usage: u64) -> Result<usize> {
        self.storage.prune_skills(min_success_rate, min_usage).await
    }
}

/// Minimal self-critique when the caller supplies none.
fn generate_critique(task: &str, action: &str, success: bool, reward: f32) -> String {
    if success {
        format!("'{action}' worked for '{task}' (reward {reward:.2}); reuse when the context matches.")
    } else {
        format!("'{action}' fell short for '{task}' (reward {reward:.2}); prefer a different strategy next time.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn memory() -> ReflexionMemory {
        ReflexionMemory::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(EmbeddingService::mock(64)),
        )
    }

    fn input(task: &str, success: bool, reward: f32) -> EpisodeInput {
        EpisodeInput {
            session_id: "session-1".into(),
            task: task.into(),
            action: "genre_weighted".into(),
            reward,
            success,
            critique: None,
            learnings: vec![],
        }
    }

    #[tokio::test]
    async fn stored_episode_gets_critique_and_embedding() {
        let memory = memory();
        let id = memory
            .store_episode(input("evening drama picks", true, 0.8))
            .await
            .unwrap();
        assert!(id > 0);

        let results = memory
            .retrieve_relevant(&EpisodeQuery::new("evening drama picks", 5))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].critique.is_empty());
        assert!(!results[0].embedding.is_empty());
    }

    #[tokio::test]
    async fn retrieval_filters_apply() {
        let memory = memory();
        memory.store_episode(input("task a", true, 0.9)).await.unwrap();
        memory.store_episode(input("task a", false, -0.5)).await.unwrap();

        let mut query = EpisodeQuery::new("task a", 10);
        query.only_success = true;
        let results = memory.retrieve_relevant(&query).await.unwrap();
        assert!(results.iter().all(|e| e.success));

        let mut query = EpisodeQuery::new("task a", 10);
        query.max_reward = Some(0.0);
        let results = memory.retrieve_relevant(&query).await.unwrap();
        assert!(results.iter().all(|e| e.reward <= 0.0));
    }
}
