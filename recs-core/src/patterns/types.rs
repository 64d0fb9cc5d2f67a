//! Recommendation pattern model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ContentTypePreference, Platform, TimeOfDay, UserSegment};

/// Strategy family a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ColdStart,
    GenreMatch,
    SimilarContent,
    TimeBased,
    NetworkBased,
    Custom,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::ColdStart => "cold_start",
            TaskType::GenreMatch => "genre_match",
            TaskType::SimilarContent => "similar_content",
            TaskType::TimeBased => "time_based",
            TaskType::NetworkBased => "network_based",
            TaskType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cold_start" => Some(TaskType::ColdStart),
            "genre_match" => Some(TaskType::GenreMatch),
            "similar_content" => Some(TaskType::SimilarContent),
            "time_based" => Some(TaskType::TimeBased),
            "network_based" => Some(TaskType::NetworkBased),
            "custom" => Some(TaskType::Custom),
            _ => None,
        }
    }

    /// All seedable task types, used by pruning's per-type floor.
    pub const ALL: [TaskType; 6] = [
        TaskType::ColdStart,
        TaskType::GenreMatch,
        TaskType::SimilarContent,
        TaskType::TimeBased,
        TaskType::NetworkBased,
        TaskType::Custom,
    ];
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request context a pattern was learned for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternContext {
    /// `None` means the pattern applies to every segment.
    pub user_segment: Option<UserSegment>,
    pub time_of_day: TimeOfDay,
    /// Weekday name, or "any".
    pub day_of_week: String,
    pub platform: Platform,
    pub content_type_preference: ContentTypePreference,
    /// Up to three genres, most relevant first.
    pub top_genres: Vec<String>,
}

impl PatternContext {
    /// Wildcard context used by seeded patterns.
    #[must_use]
    pub fn any() -> Self {
        Self {
            user_segment: None,
            time_of_day: TimeOfDay::Any,
            day_of_week: "any".to_string(),
            platform: Platform::Any,
            content_type_preference: ContentTypePreference::Both,
            top_genres: Vec::new(),
        }
    }

    /// Canonical sentence this context embeds as. The wording is part of
    /// the persisted-embedding contract; do not reword casually.
    #[must_use]
    pub fn to_sentence(&self) -> String {
        format!(
            "User segment: {} Time: {} Day: {} Platform: {} Preference: {} Top genres: {}",
            self.user_segment.map_or("any", UserSegment::as_str),
            self.time_of_day.as_str(),
            self.day_of_week,
            self.platform.as_str(),
            self.content_type_preference.as_str(),
            self.top_genres.join(", "),
        )
    }
}

/// A learned strategy instance with its running statistics.
///
/// `success_rate` and `avg_reward` are maintained as running means over
/// every outcome that referenced the pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPattern {
    /// Store-assigned id; 0 until first persisted.
    pub id: i64,
    pub task_type: TaskType,
    /// Free-text description of the approach.
    pub approach: String,
    /// Running mean of 0/1 outcomes, in [0, 1].
    pub success_rate: f32,
    pub total_uses: u64,
    /// Running mean of rewards, in [-1, 1].
    pub avg_reward: f32,
    pub context: PatternContext,
    /// Unit-norm embedding of the canonical context sentence.
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl RecommendationPattern {
    /// New unsaved pattern with zeroed statistics.
    #[must_use]
    pub fn new(task_type: TaskType, approach: impl Into<String>, context: PatternContext) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            task_type,
            approach: approach.into(),
            success_rate: 0.0,
            total_uses: 0,
            avg_reward: 0.0,
            context,
            embedding: Vec::new(),
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }

    /// Fold one outcome into the running statistics.
    ///
    /// `total_uses` grows by exactly one per call; the means use the
    /// incremental form `m += (x - m) / n`.
    pub fn apply_outcome(&mut self, success: bool, reward: f32) {
        self.total_uses += 1;
        let n = self.total_uses as f32;
        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate += (outcome - self.success_rate) / n;
        self.avg_reward += (reward - self.avg_reward) / n;
        self.success_rate = self.success_rate.clamp(0.0, 1.0);
        self.avg_reward = self.avg_reward.clamp(-1.0, 1.0);
        let now = Utc::now();
        self.updated_at = now;
        self.last_used_at = Some(now);
    }
}

/// Statistics snapshot returned by an outcome update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub total_uses: u64,
    pub success_rate: f32,
    pub avg_reward: f32,
}

/// Pruning policy for stale or underperforming patterns.
///
/// A pattern is pruned when it has been judged enough times and fails a
/// quality floor, or has aged out, subject to a per-task-type minimum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrunePolicy {
    /// Patterns with at least this many uses are judged on quality.
    pub min_uses_before_judgement: u64,
    pub min_success_rate: f32,
    pub min_avg_reward: f32,
    pub max_age_days: i64,
    /// Never prune below this many patterns per task type.
    pub keep_min_per_task_type: usize,
}

impl Default for PrunePolicy {
    fn default() -> Self {
        Self {
            min_uses_before_judgement: 10,
            min_success_rate: 0.3,
            min_avg_reward: -0.5,
            max_age_days: 180,
            keep_min_per_task_type: 1,
        }
    }
}

impl PrunePolicy {
    /// Whether a pattern fails the policy (ignoring the per-type floor).
    #[must_use]
    pub fn condemns(&self, pattern: &RecommendationPattern, now: DateTime<Utc>) -> bool {
        let judged_and_failing = pattern.total_uses >= self.min_uses_before_judgement
            && pattern.success_rate < self.min_success_rate;
        let reward_failing = pattern.avg_reward < self.min_avg_reward;
        let aged_out =
            now.signed_duration_since(pattern.created_at).num_days() > self.max_age_days;
        judged_and_failing || reward_failing || aged_out
    }
}

/// The five initial patterns installed into an empty store.
#[must_use]
pub fn seed_patterns() -> Vec<RecommendationPattern> {
    let seeds = [
        (
            TaskType::ColdStart,
            "Popular highly-rated content for new users",
            0.60,
        ),
        (
            TaskType::GenreMatch,
            "Match content genres to user genre preferences",
            0.75,
        ),
        (
            TaskType::SimilarContent,
            "Nearest neighbors of the user preference vector",
            0.80,
        ),
        (
            TaskType::TimeBased,
            "Bias series in the evening, movies otherwise",
            0.65,
        ),
        (
            TaskType::NetworkBased,
            "Content from the user's most-watched networks",
            0.70,
        ),
    ];
    seeds
        .into_iter()
        .map(|(task_type, approach, success_rate)| {
            let mut pattern = RecommendationPattern::new(task_type, approach, PatternContext::any());
            pattern.success_rate = success_rate;
            pattern
        })
        .collect()
}
