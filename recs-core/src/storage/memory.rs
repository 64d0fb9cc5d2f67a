//! In-memory storage backend.
//!
//! Exact-scan vector search over hash maps behind one `RwLock`. Backs
//! unit and integration tests and database-free deployments; semantics
//! match the Postgres backend, including the image-URL merge rule and
//! idempotent feedback inserts.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::embedding::geometry::cosine_distance;
use crate::learning::{QEntry, ReplayExperience};
use crate::patterns::{PatternStats, PrunePolicy, RecommendationPattern};
use crate::reflexion::{EpisodePrunePolicy, ReflexionEpisode, Skill};
use crate::types::{Content, LearningFeedback, SyncStatus, UserPreference};
use crate::Result;

use super::{SearchFilter, StorageBackend, VectorTable};

#[derive(Default)]
struct Inner {
    content: HashMap<String, Content>,
    preferences: HashMap<Uuid, UserPreference>,
    patterns: BTreeMap<i64, RecommendationPattern>,
    next_pattern_id: i64,
    feedback: Vec<LearningFeedback>,
    feedback_ids: HashSet<Uuid>,
    q_table: BTreeMap<(String, String), QEntry>,
    replay: Vec<ReplayExperience>,
    episodes: BTreeMap<i64, ReflexionEpisode>,
    next_episode_id: i64,
    skills: HashMap<String, Skill>,
    sync_status: Vec<SyncStatus>,
    advisory_locks: HashSet<String>,
}

/// Hash-map storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn upsert_content(&self, batch: &[Content]) -> Result<usize> {
        let mut inner = self.inner.write();
        for item in batch {
            let mut row = item.clone();
            if let Some(existing) = inner.content.get(&item.id) {
                // Preserve stored image URLs when the new row omits them.
                if row.image_url.is_none() {
                    row.image_url = existing.image_url.clone();
                }
                if row.thumbnail_url.is_none() {
                    row.thumbnail_url = existing.thumbnail_url.clone();
                }
            }
            inner.content.insert(row.id.clone(), row);
        }
        Ok(batch.len())
    }

    async fn get_content(&self, id: &str) -> Result<Option<Content>> {
        Ok(self.inner.read().content.get(id).cloned())
    }

    async fn get_content_batch(&self, ids: &[String]) -> Result<Vec<Content>> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.content.get(id).cloned())
            .collect())
    }

    async fn search_content_text(&self, query: &str, limit: usize) -> Result<Vec<Content>> {
        let needle = query.to_lowercase();
        let inner = self.inner.read();
        let mut hits: Vec<Content> = inner
            .content
            .values()
            .filter(|c| {
                c.title.to_lowercase().contains(&needle)
                    || c.overview.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.rating_or_zero()
                .partial_cmp(&a.rating_or_zero())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn list_content(&self, limit: usize) -> Result<Vec<Content>> {
        let inner = self.inner.read();
        let mut rows: Vec<Content> = inner.content.values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list_content_with_embeddings(&self, limit: usize) -> Result<Vec<Content>> {
        let inner = self.inner.read();
        let mut rows: Vec<Content> = inner
            .content
            .values()
            .filter(|c| c.embedding.is_some())
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn update_content_embeddings(&self, updates: &[(String, Vec<f32>)]) -> Result<()> {
        let mut inner = self.inner.write();
        for (id, embedding) in updates {
            if let Some(row) = inner.content.get_mut(id) {
                row.embedding = Some(embedding.clone());
                row.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn content_count(&self) -> Result<u64> {
        Ok(self.inner.read().content.len() as u64)
    }

    async fn vector_search(
        &self,
        table: VectorTable,
        query: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<(String, f32)>> {
        let inner = self.inner.read();
        let mut scored: Vec<(String, f32)> = match table {
            VectorTable::Content => inner
                .content
                .values()
                .filter(|c| filter.matches(c))
                .filter_map(|c| {
                    c.embedding
                        .as_ref()
                        .map(|e| (c.id.clone(), cosine_distance(query, e)))
                })
                .collect(),
            VectorTable::Patterns => inner
                .patterns
                .values()
                .filter(|p| !p.embedding.is_empty())
                .map(|p| (p.id.to_string(), cosine_distance(query, &p.embedding)))
                .collect(),
            VectorTable::ReflexionEpisodes => inner
                .episodes
                .values()
                .filter(|e| !e.embedding.is_empty())
                .map(|e| (e.id.to_string(), cosine_distance(query, &e.embedding)))
                .collect(),
        };
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn index_maintenance(&self) -> Result<()> {
        // Exact scan has no index to maintain.
        Ok(())
    }

    async fn write_user_preference(&self, preference: &UserPreference) -> Result<()> {
        self.inner
            .write()
            .preferences
            .insert(preference.user_id, preference.clone());
        Ok(())
    }

    async fn get_user_preference(&self, user_id: Uuid) -> Result<Option<UserPreference>> {
        Ok(self.inner.read().preferences.get(&user_id).cloned())
    }

    async fn insert_feedback(&self, record: &LearningFeedback) -> Result<bool> {
        let mut inner = self.inner.write();
        if !inner.feedback_ids.insert(record.id) {
            return Ok(false);
        }
        inner.feedback.push(record.clone());
        Ok(true)
    }

    async fn read_feedback_window(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<LearningFeedback>> {
        Ok(self
            .inner
            .read()
            .feedback
            .iter()
            .filter(|f| f.created_at >= since && f.created_at < until)
            .cloned()
            .collect())
    }

    async fn upsert_pattern(&self, pattern: &RecommendationPattern) -> Result<i64> {
        let mut inner = self.inner.write();
        let existing_id = if pattern.id > 0 {
            inner.patterns.contains_key(&pattern.id).then_some(pattern.id)
        } else {
            inner
                .patterns
                .values()
                .find(|p| p.task_type == pattern.task_type && p.approach == pattern.approach)
                .map(|p| p.id)
        };

        match existing_id {
            Some(id) => {
                let mut row = pattern.clone();
                row.id = id;
                if let Some(previous) = inner.patterns.get(&id) {
                    row.created_at = previous.created_at;
                }
                row.updated_at = Utc::now();
                inner.patterns.insert(id, row);
                Ok(id)
            }
            None => {
                inner.next_pattern_id += 1;
                let id = inner.next_pattern_id;
                let mut row = pattern.clone();
                row.id = id;
                inner.patterns.insert(id, row);
                Ok(id)
            }
        }
    }

    async fn get_pattern(&self, id: i64) -> Result<Option<RecommendationPattern>> {
        Ok(self.inner.read().patterns.get(&id).cloned())
    }

    async fn list_patterns(&self) -> Result<Vec<RecommendationPattern>> {
        Ok(self.inner.read().patterns.values().cloned().collect())
    }

    async fn record_pattern_outcome(
        &self,
        id: i64,
        success: bool,
        reward: f32,
    ) -> Result<Option<PatternStats>> {
        let mut inner = self.inner.write();
        let Some(pattern) = inner.patterns.get_mut(&id) else {
            return Ok(None);
        };
        pattern.apply_outcome(success, reward);
        Ok(Some(PatternStats {
            total_uses: pattern.total_uses,
            success_rate: pattern.success_rate,
            avg_reward: pattern.avg_reward,
        }))
    }

    async fn prune_patterns(&self, policy: &PrunePolicy) -> Result<usize> {
        let now = Utc::now();
        let mut inner = self.inner.write();

        let mut condemned: Vec<i64> = Vec::new();
        for task_type in crate::patterns::TaskType::ALL {
            let mut of_type: Vec<&RecommendationPattern> = inner
                .patterns
                .values()
                .filter(|p| p.task_type == task_type)
                .collect();
            // Worst first, so the per-type floor keeps the best survivors.
            of_type.sort_by(|a, b| {
                a.success_rate
                    .partial_cmp(&b.success_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let total = of_type.len();
            let mut removable = total.saturating_sub(policy.keep_min_per_task_type);
            for pattern in of_type {
                if removable == 0 {
                    break;
                }
                if policy.condemns(pattern, now) {
                    condemned.push(pattern.id);
                    removable -= 1;
                }
            }
        }
        for id in &condemned {
            inner.patterns.remove(id);
        }
        Ok(condemned.len())
    }

    async fn persist_q_entries(&self, entries: &[QEntry]) -> Result<()> {
        let mut inner = self.inner.write();
        for entry in entries {
            inner
                .q_table
                .insert((entry.state.clone(), entry.action.clone()), entry.clone());
        }
        Ok(())
    }

    async fn load_q_table(&self) -> Result<Vec<QEntry>> {
        Ok(self.inner.read().q_table.values().cloned().collect())
    }

    async fn persist_replay(&self, experiences: &[ReplayExperience]) -> Result<()> {
        self.inner.write().replay.extend_from_slice(experiences);
        Ok(())
    }

    async fn load_replay(&self, limit: usize) -> Result<Vec<ReplayExperience>> {
        let inner = self.inner.read();
        let start = inner.replay.len().saturating_sub(limit);
        Ok(inner.replay[start..].to_vec())
    }

    async fn insert_reflexion_episode(&self, episode: &ReflexionEpisode) -> Result<i64> {
        let mut inner = self.inner.write();
        inner.next_episode_id += 1;
        let id = inner.next_episode_id;
        let mut row = episode.clone();
        row.id = id;
        inner.episodes.insert(id, row);
        Ok(id)
    }

    async fn list_reflexion_episodes(&self) -> Result<Vec<ReflexionEpisode>> {
        Ok(self.inner.read().episodes.values().cloned().collect())
    }

    async fn prune_reflexion_episodes(&self, policy: &EpisodePrunePolicy) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(policy.max_age_days);
        let mut inner = self.inner.write();

        // Newest-first per task, so the keep floor retains recent history.
        let mut by_task: HashMap<String, Vec<(i64, DateTime<Utc>, f32)>> = HashMap::new();
        for episode in inner.episodes.values() {
            by_task.entry(episode.task.clone()).or_default().push((
                episode.id,
                episode.created_at,
                episode.reward,
            ));
        }

        let mut condemned = Vec::new();
        for entries in by_task.values_mut() {
            entries.sort_by(|a, b| b.1.cmp(&a.1));
            for (id, created_at, reward) in entries.iter().skip(policy.keep_min_per_task) {
                if *created_at < cutoff || *reward < policy.min_reward {
                    condemned.push(*id);
                }
            }
        }
        for id in &condemned {
            inner.episodes.remove(id);
        }
        Ok(condemned.len())
    }

    async fn upsert_skill(&self, skill: &Skill) -> Result<()> {
        self.inner
            .write()
            .skills
            .insert(skill.name.clone(), skill.clone());
        Ok(())
    }

    async fn list_skills(&self) -> Result<Vec<Skill>> {
        let mut skills: Vec<Skill> = self.inner.read().skills.values().cloned().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }

    async fn prune_skills(&self, min_success_rate: f32, min_usage: u64) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.skills.len();
        inner
            .skills
            .retain(|_, s| s.success_rate >= min_success_rate || s.usage_count >= min_usage);
        Ok(before - inner.skills.len())
    }

    async fn write_sync_status(&self, status: &SyncStatus) -> Result<()> {
        self.inner.write().sync_status.push(status.clone());
        Ok(())
    }

    async fn last_sync_status(&self, sync_type: &str) -> Result<Option<SyncStatus>> {
        Ok(self
            .inner
            .read()
            .sync_status
            .iter()
            .rev()
            .find(|s| s.sync_type == sync_type)
            .cloned())
    }

    async fn try_advisory_lock(&self, key: &str) -> Result<bool> {
        Ok(self.inner.write().advisory_locks.insert(key.to_string()))
    }

    async fn release_advisory_lock(&self, key: &str) -> Result<()> {
        self.inner.write().advisory_locks.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::geometry::l2_normalize;
    use crate::patterns::{PatternContext, TaskType};

    fn content(id: &str, title: &str, rating: Option<f32>, embedding: Option<Vec<f32>>) -> Content {
        Content {
            id: id.to_string(),
            kind: crate::types::ContentKind::Series,
            title: title.to_string(),
            year: Some(2020),
            overview: format!("{title} overview"),
            genres: vec!["Drama".into()],
            original_language: Some("eng".into()),
            original_country: None,
            rating,
            network_id: None,
            network_name: None,
            first_aired: None,
            image_url: Some("http://img/1.jpg".into()),
            thumbnail_url: None,
            embedding,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_preserves_existing_image_urls() {
        let storage = MemoryStorage::new();
        let original = content("a", "First", Some(8.0), None);
        storage.upsert_content(&[original]).await.unwrap();

        let mut update = content("a", "First (updated)", Some(8.5), None);
        update.image_url = None;
        storage.upsert_content(&[update]).await.unwrap();

        let row = storage.get_content("a").await.unwrap().unwrap();
        assert_eq!(row.title, "First (updated)");
        assert_eq!(row.image_url.as_deref(), Some("http://img/1.jpg"));
    }

    #[tokio::test]
    async fn vector_search_orders_by_distance() {
        let storage = MemoryStorage::new();
        let near = l2_normalize(&[1.0, 0.1, 0.0]);
        let far = l2_normalize(&[0.0, 1.0, 0.0]);
        storage
            .upsert_content(&[
                content("near", "Near", None, Some(near)),
                content("far", "Far", None, Some(far)),
                content("no-embedding", "None", None, None),
            ])
            .await
            .unwrap();

        let query = l2_normalize(&[1.0, 0.0, 0.0]);
        let hits = storage
            .vector_search(VectorTable::Content, &query, 10, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "near");
        assert!(hits[0].1 < hits[1].1);
    }

    #[tokio::test]
    async fn feedback_insert_is_idempotent() {
        let storage = MemoryStorage::new();
        let record = LearningFeedback {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content_id: "c".into(),
            pattern_id: None,
            was_successful: true,
            reward: 0.5,
            user_action: crate::types::UserAction::Watched,
            recommendation_position: Some(1),
            created_at: Utc::now(),
        };
        assert!(storage.insert_feedback(&record).await.unwrap());
        assert!(!storage.insert_feedback(&record).await.unwrap());
        let window = storage
            .read_feedback_window(Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
    }

    #[tokio::test]
    async fn pattern_upsert_matches_on_type_and_approach() {
        let storage = MemoryStorage::new();
        let pattern =
            RecommendationPattern::new(TaskType::Custom, "Cluster drama", PatternContext::any());
        let first = storage.upsert_pattern(&pattern).await.unwrap();
        let second = storage.upsert_pattern(&pattern).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(storage.list_patterns().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pattern_outcome_updates_running_stats() {
        let storage = MemoryStorage::new();
        let mut pattern =
            RecommendationPattern::new(TaskType::GenreMatch, "g", PatternContext::any());
        pattern.success_rate = 0.6;
        pattern.avg_reward = 0.2;
        pattern.total_uses = 10;
        let id = storage.upsert_pattern(&pattern).await.unwrap();

        let stats = storage
            .record_pattern_outcome(id, true, 0.8)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.total_uses, 11);
        assert!((stats.success_rate - 0.6364).abs() < 1e-3);
        assert!((stats.avg_reward - 0.2545).abs() < 1e-3);
    }

    #[tokio::test]
    async fn prune_respects_per_type_floor() {
        let storage = MemoryStorage::new();
        for i in 0..3 {
            let mut p = RecommendationPattern::new(
                TaskType::Custom,
                format!("bad {i}"),
                PatternContext::any(),
            );
            p.total_uses = 50;
            p.success_rate = 0.05;
            storage.upsert_pattern(&p).await.unwrap();
        }
        let removed = storage
            .prune_patterns(&PrunePolicy::default())
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(storage.list_patterns().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn advisory_lock_is_exclusive() {
        let storage = MemoryStorage::new();
        assert!(storage.try_advisory_lock("cycle").await.unwrap());
        assert!(!storage.try_advisory_lock("cycle").await.unwrap());
        storage.release_advisory_lock("cycle").await.unwrap();
        assert!(storage.try_advisory_lock("cycle").await.unwrap());
    }
}
