//! Row-to-domain mapping.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;

use recs_core::learning::{ExperienceContext, QEntry, ReplayExperience};
use recs_core::patterns::{PatternContext, RecommendationPattern, TaskType};
use recs_core::reflexion::{ReflexionEpisode, Skill};
use recs_core::types::{
    Content, ContentKind, ContentTypePreference, LearningFeedback, Platform, SyncStatus,
    TimeOfDay, UserAction, UserPreference, UserSegment, WatchEvent,
};
use recs_core::{Error, Result};

use crate::parse_vector;

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| Error::StorePermanent(format!("column {column}: {e}")))
}

fn embedding_from(row: &PgRow, column: &str) -> Result<Option<Vec<f32>>> {
    let text: Option<String> = get(row, column)?;
    match text {
        Some(text) => parse_vector(&text)
            .map(Some)
            .ok_or_else(|| Error::StorePermanent(format!("malformed vector in {column}"))),
        None => Ok(None),
    }
}

/// Map a content row. Expects `embedding::text AS embedding_text` in the
/// projection.
pub fn content_from_row(row: &PgRow) -> Result<Content> {
    let kind_text: String = get(row, "content_type")?;
    let kind = ContentKind::parse(&kind_text)
        .ok_or_else(|| Error::StorePermanent(format!("unknown content_type {kind_text}")))?;
    Ok(Content {
        id: get(row, "id")?,
        kind,
        title: get(row, "title")?,
        year: get::<Option<i32>>(row, "year")?,
        overview: get(row, "overview")?,
        genres: get::<Vec<String>>(row, "genres")?,
        original_language: get(row, "original_language")?,
        original_country: get(row, "original_country")?,
        rating: get::<Option<f32>>(row, "rating")?,
        network_id: get::<Option<i32>>(row, "network_id")?,
        network_name: get(row, "network_name")?,
        first_aired: get::<Option<NaiveDate>>(row, "first_aired")?,
        image_url: get(row, "image_url")?,
        thumbnail_url: get(row, "thumbnail_url")?,
        embedding: embedding_from(row, "embedding_text")?,
        updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
    })
}

/// Column list matching [`content_from_row`].
pub const CONTENT_COLUMNS: &str = "id, content_type, title, year, overview, genres, \
     original_language, original_country, rating, network_id, network_name, first_aired, \
     image_url, thumbnail_url, embedding::text AS embedding_text, updated_at";

pub fn pattern_from_row(row: &PgRow) -> Result<RecommendationPattern> {
    let type_text: String = get(row, "pattern_type")?;
    let task_type = TaskType::parse(&type_text)
        .ok_or_else(|| Error::StorePermanent(format!("unknown pattern_type {type_text}")))?;
    let segment_text: String = get(row, "user_segment")?;
    let user_segment = match segment_text.as_str() {
        "any" => None,
        "new" => Some(UserSegment::New),
        "casual" => Some(UserSegment::Casual),
        "regular" => Some(UserSegment::Regular),
        "power" => Some(UserSegment::Power),
        other => return Err(Error::StorePermanent(format!("unknown segment {other}"))),
    };
    let time_text: String = get(row, "time_of_day")?;
    let time_of_day = match time_text.as_str() {
        "morning" => TimeOfDay::Morning,
        "afternoon" => TimeOfDay::Afternoon,
        "evening" => TimeOfDay::Evening,
        "night" => TimeOfDay::Night,
        _ => TimeOfDay::Any,
    };
    let platform_text: String = get(row, "platform")?;
    let platform = match platform_text.as_str() {
        "web" => Platform::Web,
        "mobile" => Platform::Mobile,
        "tv" => Platform::Tv,
        _ => Platform::Any,
    };
    let pref_text: String = get(row, "content_type_preference")?;
    let content_type_preference = match pref_text.as_str() {
        "series" => ContentTypePreference::Series,
        "movie" => ContentTypePreference::Movie,
        _ => ContentTypePreference::Both,
    };

    Ok(RecommendationPattern {
        id: get::<i64>(row, "id")?,
        task_type,
        approach: get(row, "approach")?,
        success_rate: get(row, "success_rate")?,
        total_uses: get::<i64>(row, "total_uses")?.max(0) as u64,
        avg_reward: get(row, "avg_reward")?,
        context: PatternContext {
            user_segment,
            time_of_day,
            day_of_week: get(row, "day_of_week")?,
            platform,
            content_type_preference,
            top_genres: get::<Vec<String>>(row, "top_genres")?,
        },
        embedding: embedding_from(row, "embedding_text")?.unwrap_or_default(),
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
        updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
        last_used_at: get::<Option<DateTime<Utc>>>(row, "last_used_at")?,
    })
}

/// Column list matching [`pattern_from_row`].
pub const PATTERN_COLUMNS: &str = "id, pattern_type, approach, success_rate, total_uses, \
     avg_reward, user_segment, time_of_day, day_of_week, platform, content_type_preference, \
     top_genres, embedding::text AS embedding_text, created_at, updated_at, last_used_at";

pub fn preference_from_row(row: &PgRow) -> Result<UserPreference> {
    let watch_history: Vec<WatchEvent> =
        serde_json::from_value(get::<serde_json::Value>(row, "watch_history")?)?;
    let genre_weights = serde_json::from_value(get::<serde_json::Value>(row, "genre_weights")?)?;
    let network_weights =
        serde_json::from_value(get::<serde_json::Value>(row, "network_weights")?)?;
    let ratings = serde_json::from_value(get::<serde_json::Value>(row, "ratings")?)?;
    Ok(UserPreference {
        user_id: get(row, "user_id")?,
        vector: embedding_from(row, "vector_text")?.unwrap_or_default(),
        genre_weights,
        network_weights,
        watch_history,
        ratings,
        updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
    })
}

pub fn feedback_from_row(row: &PgRow) -> Result<LearningFeedback> {
    let action_text: String = get(row, "user_action")?;
    let user_action = UserAction::parse(&action_text)
        .ok_or_else(|| Error::StorePermanent(format!("unknown user_action {action_text}")))?;
    Ok(LearningFeedback {
        id: get(row, "id")?,
        user_id: get(row, "user_id")?,
        content_id: get(row, "content_id")?,
        pattern_id: get::<Option<i64>>(row, "pattern_id")?,
        was_successful: get(row, "was_successful")?,
        reward: get(row, "reward")?,
        user_action,
        recommendation_position: get::<Option<i32>>(row, "recommendation_position")?,
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
    })
}

pub fn q_entry_from_row(row: &PgRow) -> Result<QEntry> {
    Ok(QEntry {
        state: get(row, "state")?,
        action: get(row, "action")?,
        value: f64::from(get::<f32>(row, "value")?),
        updates: i64::from(get::<i32>(row, "updates")?),
    })
}

pub fn replay_from_row(row: &PgRow) -> Result<ReplayExperience> {
    let action_text: String = get(row, "action")?;
    let action = recs_core::Action::parse(&action_text)
        .ok_or_else(|| Error::StorePermanent(format!("unknown action {action_text}")))?;
    let context: ExperienceContext =
        serde_json::from_value(get::<serde_json::Value>(row, "context")?)?;
    Ok(ReplayExperience {
        state: get(row, "state")?,
        action,
        reward: get(row, "reward")?,
        next_state: get(row, "next_state")?,
        done: get(row, "done")?,
        context,
        priority: f64::from(get::<f32>(row, "priority")?),
    })
}

pub fn episode_from_row(row: &PgRow) -> Result<ReflexionEpisode> {
    let outcome: String = get(row, "outcome")?;
    let learnings: Vec<String> =
        serde_json::from_value(get::<serde_json::Value>(row, "learnings")?)?;
    Ok(ReflexionEpisode {
        id: get::<i64>(row, "id")?,
        session_id: get(row, "session_id")?,
        task: get(row, "task")?,
        action: get(row, "action")?,
        reward: get(row, "reward")?,
        success: outcome == "ok",
        critique: get(row, "self_critique")?,
        learnings,
        embedding: embedding_from(row, "embedding_text")?.unwrap_or_default(),
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
    })
}

pub fn skill_from_row(row: &PgRow) -> Result<Skill> {
    Ok(Skill {
        name: get(row, "name")?,
        description: get(row, "description")?,
        signature: get(row, "signature")?,
        code: get(row, "code")?,
        domain: get(row, "domain")?,
        success_rate: get(row, "success_rate")?,
        usage_count: get::<i64>(row, "usage_count")?.max(0) as u64,
        avg_execution_time_ms: get(row, "avg_execution_time_ms")?,
    })
}

pub fn sync_status_from_row(row: &PgRow) -> Result<SyncStatus> {
    Ok(SyncStatus {
        sync_type: get(row, "sync_type")?,
        last_sync_timestamp: get(row, "last_sync_timestamp")?,
        items_synced: i64::from(get::<i32>(row, "items_synced")?),
        status: get(row, "status")?,
        metadata: get::<serde_json::Value>(row, "metadata")?,
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
    })
}
