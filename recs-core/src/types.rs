//! Core domain types shared across the engine.
//!
//! Entities are relational: patterns are referenced from feedback by id,
//! episodes and skills stand alone. Relations are expressed as id + lookup,
//! never as object references.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::WATCH_HISTORY_LIMIT;
use crate::embedding::geometry::l2_normalize;

// ============================================================================
// Catalog content
// ============================================================================

/// Kind of catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Series,
    Movie,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Series => "series",
            ContentKind::Movie => "movie",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "series" => Some(ContentKind::Series),
            "movie" => Some(ContentKind::Movie),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single series or movie catalog entry.
///
/// Created on ingest, updated on upstream change, never deleted by the
/// engine. The embedding, when present, is unit-norm (L2 = 1 +- 1e-4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// External string id from the metadata source.
    pub id: String,
    pub kind: ContentKind,
    pub title: String,
    pub year: Option<i32>,
    pub overview: String,
    /// Ordered set; the first entry is the primary genre. Never null,
    /// empty is allowed.
    pub genres: Vec<String>,
    pub original_language: Option<String>,
    pub original_country: Option<String>,
    /// Catalog rating in [0, 10].
    pub rating: Option<f32>,
    pub network_id: Option<i32>,
    pub network_name: Option<String>,
    pub first_aired: Option<NaiveDate>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    /// 384-dim unit-norm embedding, absent until the embedding pass runs.
    pub embedding: Option<Vec<f32>>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// Primary genre is genres[0] when the set is non-empty.
    pub fn primary_genre(&self) -> Option<&str> {
        self.genres.first().map(String::as_str)
    }

    /// Rating with nulls treated as 0, for popularity ordering.
    pub fn rating_or_zero(&self) -> f32 {
        self.rating.unwrap_or(0.0)
    }
}

// ============================================================================
// User preference profile
// ============================================================================

/// One watch-history entry, most-recent-first in the containing list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub content_id: String,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: u32,
    /// Completion in [0, 100].
    pub completion_percent: f32,
}

/// Per-user preference profile.
///
/// The preference vector is the weighted, L2-normalized average of
/// embeddings of watched items, weighted by `max(rating/10, 0.5)`. Its
/// norm is either 0 (cold start) or 1 +- 1e-4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: Uuid,
    pub vector: Vec<f32>,
    /// Genre name -> weight in [0, 1].
    pub genre_weights: HashMap<String, f32>,
    /// Network name -> weight in [0, 1].
    pub network_weights: HashMap<String, f32>,
    /// Most-recent-first, trimmed to the last 100 entries.
    pub watch_history: Vec<WatchEvent>,
    /// Content id -> rating in [0, 10].
    pub ratings: HashMap<String, f32>,
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    /// Empty cold-start profile.
    pub fn cold_start(user_id: Uuid) -> Self {
        Self {
            user_id,
            vector: Vec::new(),
            genre_weights: HashMap::new(),
            network_weights: HashMap::new(),
            watch_history: Vec::new(),
            ratings: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Whether the preference vector carries any signal.
    pub fn has_vector(&self) -> bool {
        self.vector.iter().any(|v| *v != 0.0)
    }

    /// Record a watch event at the front of the history, trimming to the
    /// bounded window.
    pub fn push_watch(&mut self, event: WatchEvent) {
        self.watch_history.insert(0, event);
        self.watch_history.truncate(WATCH_HISTORY_LIMIT);
        self.updated_at = Utc::now();
    }

    /// Top-N genres by weight, ties broken by name for stability.
    pub fn top_genres(&self, n: usize) -> Vec<String> {
        let mut entries: Vec<(&String, f32)> = self
            .genre_weights
            .iter()
            .map(|(g, w)| (g, *w))
            .collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        entries.into_iter().take(n).map(|(g, _)| g.clone()).collect()
    }

    /// Top-N networks by weight, same ordering rule as genres.
    pub fn top_networks(&self, n: usize) -> Vec<String> {
        let mut entries: Vec<(&String, f32)> = self
            .network_weights
            .iter()
            .map(|(g, w)| (g, *w))
            .collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        entries.into_iter().take(n).map(|(g, _)| g.clone()).collect()
    }

    /// Recompute the preference vector from watched-item embeddings.
    ///
    /// `embeddings` maps content id to its unit-norm embedding; history
    /// entries without an embedding contribute nothing. The result is
    /// re-normalized, or left empty when no embedding was found.
    pub fn recompute_vector(&mut self, embeddings: &HashMap<String, Vec<f32>>) {
        let mut accumulator: Vec<f32> = Vec::new();
        for event in &self.watch_history {
            let Some(embedding) = embeddings.get(&event.content_id) else {
                continue;
            };
            let weight = self
                .ratings
                .get(&event.content_id)
                .map_or(0.5, |r| (r / 10.0).max(0.5));
            if accumulator.is_empty() {
                accumulator = vec![0.0; embedding.len()];
            }
            for (acc, value) in accumulator.iter_mut().zip(embedding.iter()) {
                *acc += weight * value;
            }
        }
        self.vector = if accumulator.is_empty() {
            Vec::new()
        } else {
            l2_normalize(&accumulator)
        };
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Request context enums
// ============================================================================

/// User segment derived from watch-history length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSegment {
    New,
    Casual,
    Regular,
    Power,
}

impl UserSegment {
    /// Segment boundaries: 0 new, 1-4 casual, 5-19 regular, >=20 power.
    pub fn from_history_len(len: usize) -> Self {
        match len {
            0 => UserSegment::New,
            1..=4 => UserSegment::Casual,
            5..=19 => UserSegment::Regular,
            _ => UserSegment::Power,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserSegment::New => "new",
            UserSegment::Casual => "casual",
            UserSegment::Regular => "regular",
            UserSegment::Power => "power",
        }
    }
}

/// Coarse time-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
    Any,
}

impl TimeOfDay {
    /// Bucket a local-clock hour.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
            TimeOfDay::Any => "any",
        }
    }
}

/// Requesting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Web,
    Mobile,
    Tv,
    Any,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Mobile => "mobile",
            Platform::Tv => "tv",
            Platform::Any => "any",
        }
    }
}

/// Content-type preference carried by a pattern context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypePreference {
    Series,
    Movie,
    Both,
}

impl ContentTypePreference {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentTypePreference::Series => "series",
            ContentTypePreference::Movie => "movie",
            ContentTypePreference::Both => "both",
        }
    }
}

/// Audience classification for safety filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Kids,
    Family,
    Teens,
    Adults,
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Audience::Kids => "kids",
            Audience::Family => "family",
            Audience::Teens => "teens",
            Audience::Adults => "adults",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Recommendation request / response
// ============================================================================

/// Content-kind filter on a recommendation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentFilter {
    Series,
    Movie,
    #[default]
    All,
}

impl ContentFilter {
    /// Whether a catalog kind passes this filter.
    pub fn accepts(self, kind: ContentKind) -> bool {
        match self {
            ContentFilter::All => true,
            ContentFilter::Series => kind == ContentKind::Series,
            ContentFilter::Movie => kind == ContentKind::Movie,
        }
    }
}

/// Caller-supplied request context; unset fields are resolved from the
/// local clock and defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub time_of_day: Option<TimeOfDay>,
    pub day_of_week: Option<String>,
    pub platform: Option<Platform>,
    pub audience: Option<Audience>,
    pub mood: Option<String>,
}

/// A recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    #[serde(default)]
    pub content_type: ContentFilter,
    /// Requested list length; clamped to the configured maximum.
    pub limit: usize,
    #[serde(default)]
    pub exclude_watched: bool,
    /// Optional genre pre-filter.
    pub genres: Option<Vec<String>>,
    #[serde(default)]
    pub context: RequestContext,
}

impl RecommendationRequest {
    pub fn new(user_id: impl Into<String>, limit: usize) -> Self {
        Self {
            user_id: user_id.into(),
            content_type: ContentFilter::All,
            limit,
            exclude_watched: false,
            genres: None,
            context: RequestContext::default(),
        }
    }
}

/// Why an item was selected. `kind` names the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    #[serde(rename = "type")]
    pub kind: crate::patterns::TaskType,
    pub description: String,
}

/// One ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub content_id: String,
    pub title: String,
    /// Base strategy score before diversification.
    pub score: f32,
    /// 1-indexed position in the returned list.
    pub position: usize,
    pub reason: Reason,
}

/// Correlation handle returned with a response so the caller can tie
/// later feedback to the pattern that produced the list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedbackHandle {
    pub request_id: Uuid,
    pub pattern_id: Option<i64>,
}

/// A complete recommendation response. Always an array, possibly empty;
/// every present element carries a non-empty reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub items: Vec<RecommendationItem>,
    pub feedback: Option<FeedbackHandle>,
    /// Set when the list is empty, explaining why.
    pub note: Option<Reason>,
}

impl RecommendationResponse {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            feedback: None,
            note: None,
        }
    }

    pub fn empty_with_note(note: Reason) -> Self {
        Self {
            items: Vec::new(),
            feedback: None,
            note: Some(note),
        }
    }
}

// ============================================================================
// Feedback
// ============================================================================

/// User interaction kinds that produce learning rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Watched,
    Skipped,
    Rated,
    AddedWatchlist,
    Dismissed,
    Clicked,
    Completed,
}

impl UserAction {
    pub fn as_str(self) -> &'static str {
        match self {
            UserAction::Watched => "watched",
            UserAction::Skipped => "skipped",
            UserAction::Rated => "rated",
            UserAction::AddedWatchlist => "added_watchlist",
            UserAction::Dismissed => "dismissed",
            UserAction::Clicked => "clicked",
            UserAction::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "watched" => Some(UserAction::Watched),
            "skipped" => Some(UserAction::Skipped),
            "rated" => Some(UserAction::Rated),
            "added_watchlist" => Some(UserAction::AddedWatchlist),
            "dismissed" => Some(UserAction::Dismissed),
            "clicked" => Some(UserAction::Clicked),
            "completed" => Some(UserAction::Completed),
            _ => None,
        }
    }
}

/// Append-only feedback record. The id doubles as the caller's request
/// id, making the durable write idempotent on retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningFeedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_id: String,
    pub pattern_id: Option<i64>,
    pub was_successful: bool,
    /// Reward in [-1, 1], derived deterministically from the action.
    pub reward: f32,
    pub user_action: UserAction,
    /// 1-indexed position the item held in the recommendation list.
    pub recommendation_position: Option<i32>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Sync / cycle checkpoints
// ============================================================================

/// One row of the `sync_status` checkpoint table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub sync_type: String,
    pub last_sync_timestamp: i64,
    pub items_synced: i64,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vec(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn segment_boundaries() {
        assert_eq!(UserSegment::from_history_len(0), UserSegment::New);
        assert_eq!(UserSegment::from_history_len(1), UserSegment::Casual);
        assert_eq!(UserSegment::from_history_len(4), UserSegment::Casual);
        assert_eq!(UserSegment::from_history_len(5), UserSegment::Regular);
        assert_eq!(UserSegment::from_history_len(19), UserSegment::Regular);
        assert_eq!(UserSegment::from_history_len(20), UserSegment::Power);
    }

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(13), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(20), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(2), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
    }

    #[test]
    fn watch_history_is_bounded_and_recent_first() {
        let mut pref = UserPreference::cold_start(Uuid::new_v4());
        for i in 0..150 {
            pref.push_watch(WatchEvent {
                content_id: format!("c{i}"),
                timestamp: Utc::now(),
                duration_seconds: 60,
                completion_percent: 100.0,
            });
        }
        assert_eq!(pref.watch_history.len(), WATCH_HISTORY_LIMIT);
        assert_eq!(pref.watch_history[0].content_id, "c149");
    }

    #[test]
    fn preference_vector_weighted_by_rating_floor() {
        let mut pref = UserPreference::cold_start(Uuid::new_v4());
        pref.push_watch(WatchEvent {
            content_id: "a".into(),
            timestamp: Utc::now(),
            duration_seconds: 60,
            completion_percent: 100.0,
        });
        pref.push_watch(WatchEvent {
            content_id: "b".into(),
            timestamp: Utc::now(),
            duration_seconds: 60,
            completion_percent: 100.0,
        });
        // "a" rated 2/10 -> floor weight 0.5; "b" rated 10/10 -> weight 1.0.
        pref.ratings.insert("a".into(), 2.0);
        pref.ratings.insert("b".into(), 10.0);

        let mut embeddings = HashMap::new();
        embeddings.insert("a".to_string(), unit_vec(4, 0));
        embeddings.insert("b".to_string(), unit_vec(4, 1));
        pref.recompute_vector(&embeddings);

        assert!(pref.has_vector());
        let norm: f32 = pref.vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        // Higher-rated item dominates the direction.
        assert!(pref.vector[1] > pref.vector[0]);
    }

    #[test]
    fn recompute_with_no_embeddings_stays_cold() {
        let mut pref = UserPreference::cold_start(Uuid::new_v4());
        pref.push_watch(WatchEvent {
            content_id: "missing".into(),
            timestamp: Utc::now(),
            duration_seconds: 10,
            completion_percent: 10.0,
        });
        pref.recompute_vector(&HashMap::new());
        assert!(!pref.has_vector());
    }

    #[test]
    fn top_genres_stable_under_ties() {
        let mut pref = UserPreference::cold_start(Uuid::new_v4());
        pref.genre_weights.insert("Drama".into(), 0.9);
        pref.genre_weights.insert("Comedy".into(), 0.5);
        pref.genre_weights.insert("Action".into(), 0.5);
        assert_eq!(pref.top_genres(3), vec!["Drama", "Action", "Comedy"]);
    }

    #[test]
    fn content_filter_accepts() {
        assert!(ContentFilter::All.accepts(ContentKind::Movie));
        assert!(ContentFilter::Series.accepts(ContentKind::Series));
        assert!(!ContentFilter::Series.accepts(ContentKind::Movie));
    }
}
