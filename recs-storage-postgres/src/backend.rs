//! `StorageBackend` implementation over sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use recs_core::learning::{QEntry, ReplayExperience};
use recs_core::patterns::{PatternStats, PrunePolicy, RecommendationPattern};
use recs_core::reflexion::{EpisodePrunePolicy, ReflexionEpisode, Skill};
use recs_core::storage::{SearchFilter, StorageBackend, VectorTable};
use recs_core::types::{Content, LearningFeedback, SyncStatus, UserPreference};
use recs_core::{Error, Result};

use crate::rows::{
    content_from_row, episode_from_row, feedback_from_row, pattern_from_row,
    preference_from_row, q_entry_from_row, replay_from_row, skill_from_row,
    sync_status_from_row, CONTENT_COLUMNS, PATTERN_COLUMNS,
};
use crate::{format_vector, map_sqlx_error, schema, PostgresStorage};

fn clamp_limit(limit: usize) -> i64 {
    limit.min(i64::MAX as usize) as i64
}

#[async_trait]
impl StorageBackend for PostgresStorage {
    async fn upsert_content(&self, batch: &[Content]) -> Result<usize> {
        self.with_retry(|| async {
            let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
            for item in batch {
                sqlx::query(
                    r"
                    INSERT INTO content (id, content_type, title, year, overview, genres,
                        original_language, original_country, rating, network_id, network_name,
                        first_aired, image_url, thumbnail_url, embedding, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                        $15::vector, NOW())
                    ON CONFLICT (id) DO UPDATE SET
                        content_type = EXCLUDED.content_type,
                        title = EXCLUDED.title,
                        year = EXCLUDED.year,
                        overview = EXCLUDED.overview,
                        genres = EXCLUDED.genres,
                        original_language = EXCLUDED.original_language,
                        original_country = EXCLUDED.original_country,
                        rating = EXCLUDED.rating,
                        network_id = EXCLUDED.network_id,
                        network_name = EXCLUDED.network_name,
                        first_aired = EXCLUDED.first_aired,
                        image_url = COALESCE(EXCLUDED.image_url, content.image_url),
                        thumbnail_url = COALESCE(EXCLUDED.thumbnail_url, content.thumbnail_url),
                        embedding = EXCLUDED.embedding,
                        updated_at = NOW()
                    ",
                )
                .bind(&item.id)
                .bind(item.kind.as_str())
                .bind(&item.title)
                .bind(item.year)
                .bind(&item.overview)
                .bind(&item.genres)
                .bind(&item.original_language)
                .bind(&item.original_country)
                .bind(item.rating)
                .bind(item.network_id)
                .bind(&item.network_name)
                .bind(item.first_aired)
                .bind(&item.image_url)
                .bind(&item.thumbnail_url)
                .bind(item.embedding.as_deref().map(format_vector))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            tx.commit().await.map_err(map_sqlx_error)?;
            Ok(batch.len())
        })
        .await
    }

    async fn get_content(&self, id: &str) -> Result<Option<Content>> {
        let row = sqlx::query(&format!("SELECT {CONTENT_COLUMNS} FROM content WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(content_from_row).transpose()
    }

    async fn get_content_batch(&self, ids: &[String]) -> Result<Vec<Content>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(content_from_row).collect()
    }

    async fn search_content_text(&self, query: &str, limit: usize) -> Result<Vec<Content>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {CONTENT_COLUMNS},
                   ts_rank(search_vector, plainto_tsquery('english', $1)) AS rank
            FROM content
            WHERE search_vector @@ plainto_tsquery('english', $1)
            ORDER BY rank DESC, rating DESC NULLS LAST, id
            LIMIT $2
            "
        ))
        .bind(query)
        .bind(clamp_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(content_from_row).collect()
    }

    async fn list_content(&self, limit: usize) -> Result<Vec<Content>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content ORDER BY id LIMIT $1"
        ))
        .bind(clamp_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(content_from_row).collect()
    }

    async fn list_content_with_embeddings(&self, limit: usize) -> Result<Vec<Content>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE embedding IS NOT NULL ORDER BY id LIMIT $1"
        ))
        .bind(clamp_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(content_from_row).collect()
    }

    async fn update_content_embeddings(&self, updates: &[(String, Vec<f32>)]) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        for (id, embedding) in updates {
            sqlx::query("UPDATE content SET embedding = $2::vector, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(format_vector(embedding))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn content_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(count.max(0) as u64)
    }

    async fn vector_search(
        &self,
        table: VectorTable,
        query: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<(String, f32)>> {
        let query_text = format_vector(query);
        let rows = match table {
            VectorTable::Content => {
                sqlx::query(
                    r"
                    SELECT id, (embedding <=> $1::vector)::real AS distance
                    FROM content
                    WHERE embedding IS NOT NULL
                      AND ($2::text IS NULL OR content_type = $2)
                      AND (cardinality($3::text[]) = 0 OR genres && $3)
                      AND NOT (genres && $4::text[])
                      AND NOT (id = ANY($5::text[]))
                      AND ($6::real IS NULL OR rating >= $6)
                    ORDER BY embedding <=> $1::vector
                    LIMIT $7
                    ",
                )
                .bind(&query_text)
                .bind(filter.kind.map(|kind| kind.as_str()))
                .bind(&filter.genres_any)
                .bind(&filter.exclude_genres)
                .bind(&filter.exclude_ids)
                .bind(filter.min_rating)
                .bind(clamp_limit(k))
                .fetch_all(self.pool())
                .await
            }
            VectorTable::Patterns => {
                sqlx::query(
                    r"
                    SELECT id::text AS id, (embedding <=> $1::vector)::real AS distance
                    FROM recommendation_patterns
                    WHERE embedding IS NOT NULL
                    ORDER BY embedding <=> $1::vector
                    LIMIT $2
                    ",
                )
                .bind(&query_text)
                .bind(clamp_limit(k))
                .fetch_all(self.pool())
                .await
            }
            VectorTable::ReflexionEpisodes => {
                sqlx::query(
                    r"
                    SELECT id::text AS id, (embedding <=> $1::vector)::real AS distance
                    FROM reflexion_episodes
                    WHERE embedding IS NOT NULL
                    ORDER BY embedding <=> $1::vector
                    LIMIT $2
                    ",
                )
                .bind(&query_text)
                .bind(clamp_limit(k))
                .fetch_all(self.pool())
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(|e| Error::StorePermanent(e.to_string()))?;
                let distance: f32 = row
                    .try_get("distance")
                    .map_err(|e| Error::StorePermanent(e.to_string()))?;
                Ok((id, distance))
            })
            .collect()
    }

    async fn index_maintenance(&self) -> Result<()> {
        for statement in [
            schema::CREATE_CONTENT_EMBEDDING_INDEX,
            schema::CREATE_PATTERN_EMBEDDING_INDEX,
            schema::CREATE_REFLEXION_EMBEDDING_INDEX,
            schema::CREATE_CONTENT_SEARCH_INDEX,
        ] {
            sqlx::query(statement)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        }
        debug!("vector and full-text indexes verified");
        Ok(())
    }

    async fn write_user_preference(&self, preference: &UserPreference) -> Result<()> {
        let vector = if preference.vector.is_empty() {
            None
        } else {
            Some(format_vector(&preference.vector))
        };
        sqlx::query(
            r"
            INSERT INTO user_preferences
                (user_id, preference_vector, genre_weights, network_weights, watch_history,
                 ratings, updated_at)
            VALUES ($1, $2::vector, $3, $4, $5, $6, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                preference_vector = EXCLUDED.preference_vector,
                genre_weights = EXCLUDED.genre_weights,
                network_weights = EXCLUDED.network_weights,
                watch_history = EXCLUDED.watch_history,
                ratings = EXCLUDED.ratings,
                updated_at = NOW()
            ",
        )
        .bind(preference.user_id)
        .bind(vector)
        .bind(serde_json::to_value(&preference.genre_weights)?)
        .bind(serde_json::to_value(&preference.network_weights)?)
        .bind(serde_json::to_value(&preference.watch_history)?)
        .bind(serde_json::to_value(&preference.ratings)?)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_user_preference(&self, user_id: Uuid) -> Result<Option<UserPreference>> {
        let row = sqlx::query(
            r"
            SELECT user_id, preference_vector::text AS vector_text, genre_weights,
                   network_weights, watch_history, ratings, updated_at
            FROM user_preferences WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.as_ref().map(preference_from_row).transpose()
    }

    async fn insert_feedback(&self, record: &LearningFeedback) -> Result<bool> {
        self.with_retry(|| async {
            let result = sqlx::query(
                r"
                INSERT INTO learning_feedback
                    (id, user_id, content_id, pattern_id, was_successful, reward, user_action,
                     recommendation_position, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO NOTHING
                ",
            )
            .bind(record.id)
            .bind(record.user_id)
            .bind(&record.content_id)
            .bind(record.pattern_id)
            .bind(record.was_successful)
            .bind(record.reward)
            .bind(record.user_action.as_str())
            .bind(record.recommendation_position)
            .bind(record.created_at)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
            Ok(result.rows_affected() == 1)
        })
        .await
    }

    async fn read_feedback_window(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<LearningFeedback>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, content_id, pattern_id, was_successful, reward, user_action,
                   recommendation_position, created_at
            FROM learning_feedback
            WHERE created_at >= $1 AND created_at < $2
            ORDER BY created_at
            ",
        )
        .bind(since)
        .bind(until)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(feedback_from_row).collect()
    }

    async fn upsert_pattern(&self, pattern: &RecommendationPattern) -> Result<i64> {
        let embedding = if pattern.embedding.is_empty() {
            None
        } else {
            Some(format_vector(&pattern.embedding))
        };
        let segment = pattern
            .context
            .user_segment
            .map_or("any", |segment| segment.as_str());

        if pattern.id > 0 {
            sqlx::query(
                r"
                UPDATE recommendation_patterns SET
                    pattern_type = $2, approach = $3, success_rate = $4, total_uses = $5,
                    avg_reward = $6, user_segment = $7, time_of_day = $8, day_of_week = $9,
                    platform = $10, content_type_preference = $11, top_genres = $12,
                    embedding = $13::vector, updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(pattern.id)
            .bind(pattern.task_type.as_str())
            .bind(&pattern.approach)
            .bind(pattern.success_rate)
            .bind(pattern.total_uses as i64)
            .bind(pattern.avg_reward)
            .bind(segment)
            .bind(pattern.context.time_of_day.as_str())
            .bind(&pattern.context.day_of_week)
            .bind(pattern.context.platform.as_str())
            .bind(pattern.context.content_type_preference.as_str())
            .bind(&pattern.context.top_genres)
            .bind(embedding)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
            return Ok(pattern.id);
        }

        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO recommendation_patterns
                (pattern_type, approach, success_rate, total_uses, avg_reward, user_segment,
                 time_of_day, day_of_week, platform, content_type_preference, top_genres,
                 embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12::vector)
            ON CONFLICT (pattern_type, approach) DO UPDATE SET
                success_rate = EXCLUDED.success_rate,
                total_uses = EXCLUDED.total_uses,
                avg_reward = EXCLUDED.avg_reward,
                top_genres = EXCLUDED.top_genres,
                embedding = EXCLUDED.embedding,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(pattern.task_type.as_str())
        .bind(&pattern.approach)
        .bind(pattern.success_rate)
        .bind(pattern.total_uses as i64)
        .bind(pattern.avg_reward)
        .bind(segment)
        .bind(pattern.context.time_of_day.as_str())
        .bind(&pattern.context.day_of_week)
        .bind(pattern.context.platform.as_str())
        .bind(pattern.context.content_type_preference.as_str())
        .bind(&pattern.context.top_genres)
        .bind(embedding)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(id)
    }

    async fn get_pattern(&self, id: i64) -> Result<Option<RecommendationPattern>> {
        let row = sqlx::query(&format!(
            "SELECT {PATTERN_COLUMNS} FROM recommendation_patterns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.as_ref().map(pattern_from_row).transpose()
    }

    async fn list_patterns(&self) -> Result<Vec<RecommendationPattern>> {
        let rows = sqlx::query(&format!(
            "SELECT {PATTERN_COLUMNS} FROM recommendation_patterns ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(pattern_from_row).collect()
    }

    async fn record_pattern_outcome(
        &self,
        id: i64,
        success: bool,
        reward: f32,
    ) -> Result<Option<PatternStats>> {
        // One statement per outcome keeps the update linearizable per
        // pattern row; all right-hand sides see the pre-update values.
        self.with_retry(|| async {
            let row = sqlx::query(
                r"
                UPDATE recommendation_patterns SET
                    total_uses = total_uses + 1,
                    success_rate = LEAST(1.0, GREATEST(0.0,
                        success_rate + (($2::int)::real - success_rate) / (total_uses + 1))),
                    avg_reward = LEAST(1.0, GREATEST(-1.0,
                        avg_reward + ($3 - avg_reward) / (total_uses + 1))),
                    updated_at = NOW(),
                    last_used_at = NOW()
                WHERE id = $1
                RETURNING total_uses, success_rate, avg_reward
                ",
            )
            .bind(id)
            .bind(i32::from(success))
            .bind(reward)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

            row.map(|row| {
                Ok(PatternStats {
                    total_uses: row
                        .try_get::<i64, _>("total_uses")
                        .map_err(|e| Error::StorePermanent(e.to_string()))?
                        .max(0) as u64,
                    success_rate: row
                        .try_get("success_rate")
                        .map_err(|e| Error::StorePermanent(e.to_string()))?,
                    avg_reward: row
                        .try_get("avg_reward")
                        .map_err(|e| Error::StorePermanent(e.to_string()))?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn prune_patterns(&self, policy: &PrunePolicy) -> Result<usize> {
        let result = sqlx::query(
            r"
            WITH ranked AS (
                SELECT id,
                       ROW_NUMBER() OVER (
                           PARTITION BY pattern_type
                           ORDER BY success_rate DESC, id
                       ) AS rank_in_type
                FROM recommendation_patterns
            )
            DELETE FROM recommendation_patterns p
            USING ranked r
            WHERE p.id = r.id
              AND r.rank_in_type > $1
              AND (
                    (p.total_uses >= $2 AND p.success_rate < $3)
                 OR p.avg_reward < $4
                 OR p.created_at < NOW() - make_interval(days => $5)
              )
            ",
        )
        .bind(policy.keep_min_per_task_type as i64)
        .bind(policy.min_uses_before_judgement as i64)
        .bind(policy.min_success_rate)
        .bind(policy.min_avg_reward)
        .bind(policy.max_age_days as i32)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() as usize)
    }

    async fn persist_q_entries(&self, entries: &[QEntry]) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        for entry in entries {
            sqlx::query(
                r"
                INSERT INTO q_table (state, action, value, updates, last_updated)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (state, action) DO UPDATE SET
                    value = EXCLUDED.value,
                    updates = EXCLUDED.updates,
                    last_updated = NOW()
                ",
            )
            .bind(&entry.state)
            .bind(&entry.action)
            .bind(entry.value as f32)
            .bind(entry.updates as i32)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn load_q_table(&self) -> Result<Vec<QEntry>> {
        let rows = sqlx::query("SELECT state, action, value, updates FROM q_table")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(q_entry_from_row).collect()
    }

    async fn persist_replay(&self, experiences: &[ReplayExperience]) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        for experience in experiences {
            sqlx::query(
                r"
                INSERT INTO experience_replay (state, action, reward, next_state, done,
                    context, priority)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(&experience.state)
            .bind(experience.action.as_str())
            .bind(experience.reward)
            .bind(&experience.next_state)
            .bind(experience.done)
            .bind(serde_json::to_value(&experience.context)?)
            .bind(experience.priority as f32)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn load_replay(&self, limit: usize) -> Result<Vec<ReplayExperience>> {
        let rows = sqlx::query(
            r"
            SELECT state, action, reward, next_state, done, context, priority
            FROM experience_replay ORDER BY id DESC LIMIT $1
            ",
        )
        .bind(clamp_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        let mut experiences: Vec<ReplayExperience> =
            rows.iter().map(replay_from_row).collect::<Result<_>>()?;
        experiences.reverse();
        Ok(experiences)
    }

    async fn insert_reflexion_episode(&self, episode: &ReflexionEpisode) -> Result<i64> {
        let embedding = if episode.embedding.is_empty() {
            None
        } else {
            Some(format_vector(&episode.embedding))
        };
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO reflexion_episodes (session_id, task, action, outcome, reward,
                self_critique, learnings, embedding, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::vector, $9)
            RETURNING id
            ",
        )
        .bind(&episode.session_id)
        .bind(&episode.task)
        .bind(&episode.action)
        .bind(if episode.success { "ok" } else { "fail" })
        .bind(episode.reward)
        .bind(&episode.critique)
        .bind(serde_json::to_value(&episode.learnings)?)
        .bind(embedding)
        .bind(episode.created_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(id)
    }

    async fn list_reflexion_episodes(&self) -> Result<Vec<ReflexionEpisode>> {
        let rows = sqlx::query(
            r"
            SELECT id, session_id, task, action, outcome, reward, self_critique, learnings,
                   embedding::text AS embedding_text, created_at
            FROM reflexion_episodes ORDER BY id
            ",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(episode_from_row).collect()
    }

    async fn prune_reflexion_episodes(&self, policy: &EpisodePrunePolicy) -> Result<usize> {
        let result = sqlx::query(
            r"
            WITH ranked AS (
                SELECT id,
                       ROW_NUMBER() OVER (
                           PARTITION BY task ORDER BY created_at DESC, id DESC
                       ) AS rank_in_task
                FROM reflexion_episodes
            )
            DELETE FROM reflexion_episodes e
            USING ranked r
            WHERE e.id = r.id
              AND r.rank_in_task > $1
              AND (e.created_at < NOW() - make_interval(days => $2) OR e.reward < $3)
            ",
        )
        .bind(policy.keep_min_per_task as i64)
        .bind(policy.max_age_days as i32)
        .bind(policy.min_reward)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() as usize)
    }

    async fn upsert_skill(&self, skill: &Skill) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO skills (name, description, signature, code, domain, success_rate,
                usage_count, avg_execution_time_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (name) DO UPDATE SET
                description = EXCLUDED.description,
                signature = EXCLUDED.signature,
                code = EXCLUDED.code,
                domain = EXCLUDED.domain,
                success_rate = EXCLUDED.success_rate,
                usage_count = EXCLUDED.usage_count,
                avg_execution_time_ms = EXCLUDED.avg_execution_time_ms
            ",
        )
        .bind(&skill.name)
        .bind(&skill.description)
        .bind(&skill.signature)
        .bind(&skill.code)
        .bind(&skill.domain)
        .bind(skill.success_rate)
        .bind(skill.usage_count as i64)
        .bind(skill.avg_execution_time_ms)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_skills(&self) -> Result<Vec<Skill>> {
        let rows = sqlx::query(
            r"
            SELECT name, description, signature, code, domain, success_rate, usage_count,
                   avg_execution_time_ms
            FROM skills ORDER BY name
            ",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(skill_from_row).collect()
    }

    async fn prune_skills(&self, min_success_rate: f32, min_usage: u64) -> Result<usize> {
        let result =
            sqlx::query("DELETE FROM skills WHERE success_rate < $1 AND usage_count < $2")
                .bind(min_success_rate)
                .bind(min_usage as i64)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() as usize)
    }

    async fn write_sync_status(&self, status: &SyncStatus) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO sync_status (sync_type, last_sync_timestamp, items_synced, status,
                metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&status.sync_type)
        .bind(status.last_sync_timestamp)
        .bind(status.items_synced as i32)
        .bind(&status.status)
        .bind(&status.metadata)
        .bind(status.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn last_sync_status(&self, sync_type: &str) -> Result<Option<SyncStatus>> {
        let row = sqlx::query(
            r"
            SELECT sync_type, last_sync_timestamp, items_synced, status, metadata, created_at
            FROM sync_status WHERE sync_type = $1 ORDER BY id DESC LIMIT 1
            ",
        )
        .bind(sync_type)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.as_ref().map(sync_status_from_row).transpose()
    }

    async fn try_advisory_lock(&self, key: &str) -> Result<bool> {
        let mut guard = self.lock_connection.lock().await;
        if guard.is_some() {
            return Ok(false);
        }
        let mut connection = self.pool().acquire().await.map_err(map_sqlx_error)?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock(hashtext($1))")
            .bind(key)
            .fetch_one(&mut *connection)
            .await
            .map_err(map_sqlx_error)?;
        if acquired {
            // Advisory locks are session-scoped: pin the connection so
            // the unlock runs on the same session.
            *guard = Some(connection);
        }
        Ok(acquired)
    }

    async fn release_advisory_lock(&self, key: &str) -> Result<()> {
        let mut guard = self.lock_connection.lock().await;
        if let Some(mut connection) = guard.take() {
            sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock(hashtext($1))")
                .bind(key)
                .fetch_one(&mut *connection)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }
}
