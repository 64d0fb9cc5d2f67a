//! Engine configuration.
//!
//! A single flat struct carrying every tunable knob, with defaults that
//! match the shipped behavior. The CLI layers a TOML file and environment
//! overrides on top of [`EngineConfig::default`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Strategy used for users with no watch history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColdStartStrategy {
    /// Highest recent engagement first.
    Trending,
    /// Most recently aired first.
    Recent,
    /// Highest catalog rating first.
    RatingSorted,
}

/// Top-level engine configuration.
///
/// All fields are plain data so the struct round-trips through TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Postgres connection string. `None` selects the in-memory backend.
    pub database_url: Option<String>,
    /// Embedding model identifier, passed through to the provider.
    pub embedding_model: String,
    /// Embedding dimension; all vector columns share it.
    pub embedding_dimension: usize,

    /// Default number of recommendations per request.
    pub rec_default_limit: usize,
    /// Hard cap on the per-request limit; larger requests are clamped.
    pub rec_max_limit: usize,
    /// Minimum cosine similarity for semantic candidates.
    pub rec_similarity_threshold: f32,
    /// Weight of the diversity term in greedy re-ranking.
    pub rec_diversity_factor: f32,
    /// Cold-start ordering.
    pub rec_cold_start_strategy: ColdStartStrategy,
    /// Recommendation deadline in milliseconds; on expiry the engine
    /// returns a partial or cold-start result, never a timeout error.
    pub rec_deadline_ms: u64,

    /// Master switch for the learning engine.
    pub learning_enabled: bool,
    /// Minimum feedback rows before replay training kicks in.
    pub learning_min_samples_for_training: usize,
    /// Local wall-clock time ("HH:MM") for the optimization cycle.
    pub learning_consolidation_schedule: String,
    /// Reserved; graph-network propagation is not implemented.
    pub learning_gnn_enabled: bool,
    /// Discount factor gamma for Q-learning.
    pub learning_reward_decay: f64,
    /// Q-learning step size.
    pub learning_rate: f64,
    /// Initial epsilon for epsilon-greedy selection.
    pub exploration_rate: f64,
    /// Per-feedback epsilon decay multiplier.
    pub exploration_decay: f64,
    /// Epsilon floor.
    pub min_exploration_rate: f64,
    /// Replay buffer capacity.
    pub replay_buffer_size: usize,
    /// Replay sample batch size.
    pub replay_batch_size: usize,
    /// Episodes between target-estimate refreshes.
    pub target_update_frequency: u64,
    /// Feedback deadline in milliseconds.
    pub feedback_deadline_ms: u64,

    /// Poincare-ball curvature; the code uses |K|. Hyperbolic mode is
    /// optional and off unless the store advertises support.
    pub hyperbolic_curvature: f64,

    /// Embedding cache capacity (entries).
    pub embedding_cache_entries: usize,
    /// Embedding cache TTL in seconds.
    pub embedding_cache_ttl_secs: u64,
    /// Vector-result cache capacity (entries).
    pub vector_cache_entries: usize,
    /// Vector-result cache TTL in seconds.
    pub vector_cache_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dimension: crate::constants::EMBEDDING_DIM,
            rec_default_limit: 20,
            rec_max_limit: 100,
            rec_similarity_threshold: 0.3,
            rec_diversity_factor: 0.2,
            rec_cold_start_strategy: ColdStartStrategy::RatingSorted,
            rec_deadline_ms: 250,
            learning_enabled: true,
            learning_min_samples_for_training: 100,
            learning_consolidation_schedule: "03:00".to_string(),
            learning_gnn_enabled: false,
            learning_reward_decay: 0.95,
            learning_rate: 0.1,
            exploration_rate: 0.3,
            exploration_decay: 0.995,
            min_exploration_rate: 0.05,
            replay_buffer_size: 10_000,
            replay_batch_size: 32,
            target_update_frequency: 100,
            feedback_deadline_ms: 2_000,
            hyperbolic_curvature: -1.0,
            embedding_cache_entries: 1_000,
            embedding_cache_ttl_secs: 3_600,
            vector_cache_entries: 1_000,
            vector_cache_ttl_secs: 3_600,
        }
    }
}

impl EngineConfig {
    /// Validate cross-field constraints before the engine starts.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(Error::InvalidInput("embedding_dimension must be > 0".into()));
        }
        if self.rec_max_limit == 0 || self.rec_default_limit > self.rec_max_limit {
            return Err(Error::InvalidInput(format!(
                "limit bounds invalid: default={} max={}",
                self.rec_default_limit, self.rec_max_limit
            )));
        }
        for (name, value) in [
            ("rec_diversity_factor", f64::from(self.rec_diversity_factor)),
            ("learning_rate", self.learning_rate),
            ("learning_reward_decay", self.learning_reward_decay),
            ("exploration_rate", self.exploration_rate),
            ("exploration_decay", self.exploration_decay),
            ("min_exploration_rate", self.min_exploration_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidInput(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if self.replay_batch_size == 0 || self.replay_batch_size > self.replay_buffer_size {
            return Err(Error::InvalidInput(format!(
                "replay batch {} incompatible with buffer {}",
                self.replay_batch_size, self.replay_buffer_size
            )));
        }
        if parse_schedule(&self.learning_consolidation_schedule).is_none() {
            return Err(Error::InvalidInput(format!(
                "learning_consolidation_schedule not HH:MM: {}",
                self.learning_consolidation_schedule
            )));
        }
        Ok(())
    }

    /// Parsed consolidation schedule as (hour, minute).
    pub fn consolidation_time(&self) -> (u32, u32) {
        parse_schedule(&self.learning_consolidation_schedule).unwrap_or((3, 0))
    }
}

fn parse_schedule(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.consolidation_time(), (3, 0));
        assert_eq!(config.embedding_dimension, 384);
    }

    #[test]
    fn rejects_out_of_range_rates() {
        let config = EngineConfig {
            exploration_rate: 1.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_default_limit_above_max() {
        let config = EngineConfig {
            rec_default_limit: 200,
            rec_max_limit: 100,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_schedule() {
        let config = EngineConfig {
            learning_consolidation_schedule: "25:99".to_string(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = EngineConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.rec_default_limit, config.rec_default_limit);
        assert_eq!(back.rec_cold_start_strategy, config.rec_cold_start_strategy);
    }
}
