//! # Storage Abstraction
//!
//! Unified trait over persistence backends. The durable implementation
//! lives in `recs-storage-postgres`; [`MemoryStorage`] here backs tests
//! and single-process deployments with no database.
//!
//! All operations are async. Multi-row writes (pattern synthesis plus
//! metrics, feedback plus statistics) are atomic per call: a failing
//! call leaves no partially-updated statistics behind.

mod memory;

pub use memory::MemoryStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::learning::{QEntry, ReplayExperience};
use crate::patterns::{PatternStats, PrunePolicy, RecommendationPattern};
use crate::reflexion::{EpisodePrunePolicy, ReflexionEpisode, Skill};
use crate::types::{Content, ContentKind, LearningFeedback, SyncStatus, UserPreference};
use crate::Result;

/// Tables that carry a vector column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorTable {
    Content,
    Patterns,
    ReflexionEpisodes,
}

impl VectorTable {
    pub fn table_name(self) -> &'static str {
        match self {
            VectorTable::Content => "content",
            VectorTable::Patterns => "recommendation_patterns",
            VectorTable::ReflexionEpisodes => "reflexion_episodes",
        }
    }
}

/// Predicates applied inside a vector search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Restrict to one content kind.
    pub kind: Option<ContentKind>,
    /// Require at least one overlapping genre.
    pub genres_any: Vec<String>,
    /// Exclude these genres entirely (audience safety).
    pub exclude_genres: Vec<String>,
    /// Exclude these ids (already watched, already returned).
    pub exclude_ids: Vec<String>,
    /// Minimum catalog rating.
    pub min_rating: Option<f32>,
}

impl SearchFilter {
    /// Stable fingerprint for result-cache keying.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut genres = self.genres_any.clone();
        genres.sort();
        let mut excluded_genres = self.exclude_genres.clone();
        excluded_genres.sort();
        let mut excluded_ids = self.exclude_ids.clone();
        excluded_ids.sort();
        format!(
            "kind={:?};genres={};xgenres={};xids={};minr={:?}",
            self.kind,
            genres.join(","),
            excluded_genres.join(","),
            excluded_ids.join(","),
            self.min_rating,
        )
    }

    /// Evaluate the filter against a content row.
    #[must_use]
    pub fn matches(&self, content: &Content) -> bool {
        if let Some(kind) = self.kind {
            if content.kind != kind {
                return false;
            }
        }
        if !self.genres_any.is_empty()
            && !content.genres.iter().any(|g| self.genres_any.contains(g))
        {
            return false;
        }
        if content.genres.iter().any(|g| self.exclude_genres.contains(g)) {
            return false;
        }
        if self.exclude_ids.contains(&content.id) {
            return false;
        }
        if let Some(min) = self.min_rating {
            if content.rating_or_zero() < min {
                return false;
            }
        }
        true
    }
}

/// Unified storage backend trait.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========== Content ==========

    /// Idempotent batch upsert keyed on the external id. When the
    /// incoming row omits image URLs and the stored row has them, the
    /// stored URLs are preserved.
    async fn upsert_content(&self, batch: &[Content]) -> Result<usize>;

    async fn get_content(&self, id: &str) -> Result<Option<Content>>;

    /// Bulk fetch; missing ids are silently dropped.
    async fn get_content_batch(&self, ids: &[String]) -> Result<Vec<Content>>;

    /// Lexical fallback over the full-text index.
    async fn search_content_text(&self, query: &str, limit: usize) -> Result<Vec<Content>>;

    /// All rows ordered by id, up to `limit`.
    async fn list_content(&self, limit: usize) -> Result<Vec<Content>>;

    /// Rows that currently carry an embedding, up to `limit`.
    async fn list_content_with_embeddings(&self, limit: usize) -> Result<Vec<Content>>;

    /// Atomic embedding rewrite for the optimization cycle's drift step.
    async fn update_content_embeddings(&self, updates: &[(String, Vec<f32>)]) -> Result<()>;

    async fn content_count(&self) -> Result<u64>;

    // ========== Vector search ==========

    /// Approximate nearest neighbors by cosine distance, post-filtered.
    /// Returns `(id, cosine_distance)` ascending.
    async fn vector_search(
        &self,
        table: VectorTable,
        query: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<(String, f32)>>;

    /// Create or verify the ANN index on each vector column.
    async fn index_maintenance(&self) -> Result<()>;

    // ========== User preferences ==========

    async fn write_user_preference(&self, preference: &UserPreference) -> Result<()>;

    async fn get_user_preference(&self, user_id: Uuid) -> Result<Option<UserPreference>>;

    // ========== Feedback ==========

    /// Append a feedback row. Returns `false` when a row with this id
    /// already exists (idempotent retry), in which case nothing changed.
    async fn insert_feedback(&self, record: &LearningFeedback) -> Result<bool>;

    async fn read_feedback_window(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<LearningFeedback>>;

    // ========== Patterns ==========

    /// Insert or update a pattern. A pattern with id 0 is matched on
    /// `(task_type, approach)` so seeding and cluster synthesis stay
    /// idempotent. Returns the persisted id.
    async fn upsert_pattern(&self, pattern: &RecommendationPattern) -> Result<i64>;

    async fn get_pattern(&self, id: i64) -> Result<Option<RecommendationPattern>>;

    async fn list_patterns(&self) -> Result<Vec<RecommendationPattern>>;

    /// Fold one outcome into a pattern's running statistics. The update
    /// is linearizable per pattern. Returns the new statistics, or
    /// `None` for an unknown id.
    async fn record_pattern_outcome(
        &self,
        id: i64,
        success: bool,
        reward: f32,
    ) -> Result<Option<PatternStats>>;

    /// Apply a prune policy; returns how many patterns were removed.
    async fn prune_patterns(&self, policy: &PrunePolicy) -> Result<usize>;

    // ========== Learning state ==========

    async fn persist_q_entries(&self, entries: &[QEntry]) -> Result<()>;

    async fn load_q_table(&self) -> Result<Vec<QEntry>>;

    async fn persist_replay(&self, experiences: &[ReplayExperience]) -> Result<()>;

    /// Most recent experiences, up to `limit`.
    async fn load_replay(&self, limit: usize) -> Result<Vec<ReplayExperience>>;

    // ========== Reflexion ==========

    async fn insert_reflexion_episode(&self, episode: &ReflexionEpisode) -> Result<i64>;

    async fn list_reflexion_episodes(&self) -> Result<Vec<ReflexionEpisode>>;

    async fn prune_reflexion_episodes(&self, policy: &EpisodePrunePolicy) -> Result<usize>;

    async fn upsert_skill(&self, skill: &Skill) -> Result<()>;

    async fn list_skills(&self) -> Result<Vec<Skill>>;

    async fn prune_skills(&self, min_success_rate: f32, min_usage: u64) -> Result<usize>;

    // ========== Coordination ==========

    async fn write_sync_status(&self, status: &SyncStatus) -> Result<()>;

    async fn last_sync_status(&self, sync_type: &str) -> Result<Option<SyncStatus>>;

    /// Non-blocking advisory lock; `true` when acquired.
    async fn try_advisory_lock(&self, key: &str) -> Result<bool>;

    async fn release_advisory_lock(&self, key: &str) -> Result<()>;
}
