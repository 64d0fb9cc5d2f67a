//! Feedback ingestion and learned-state lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::constants::{CHECKPOINT_INTERVAL, CHECKPOINT_REPLAY_TAIL, LINUCB_DIM};
use crate::patterns::{PatternRegistry, PatternStats};
use crate::storage::StorageBackend;
use crate::types::{ContentFilter, LearningFeedback, UserAction, UserSegment};
use crate::Result;

use super::bandits::{EnsembleSelector, SelectionInputs};
use super::qtable::DoubleQTable;
use super::replay::{priority_for, ExperienceContext, ReplayBuffer, ReplayExperience};
use super::reward::{is_success, reward_for};
use super::state::{state_key, Action};

/// Per-(state, action) reasoning statistics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
struct ReasoningPattern {
    success_rate: f32,
    confidence: f32,
    uses: u64,
}

/// One feedback call's inputs.
#[derive(Debug, Clone)]
pub struct FeedbackInput {
    /// Caller-supplied id; retries with the same id are no-ops.
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub content_id: String,
    pub pattern_id: Option<i64>,
    pub action: UserAction,
    pub completion_percent: Option<f32>,
    pub rating: Option<f32>,
    pub recommendation_position: Option<i32>,
    /// Strategy the recommendation used; selected fresh when absent.
    pub strategy: Option<Action>,
    pub genres: Vec<String>,
    pub mood: Option<String>,
    pub segment: UserSegment,
    pub content_type: ContentFilter,
    /// Next-state hint; defaults to the current state (single-step view).
    pub next_state: Option<String>,
    /// 10-dim context features for LinUCB.
    pub features: Option<[f64; LINUCB_DIM]>,
}

/// What a feedback call did.
#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    /// False when the request id was already recorded.
    pub recorded: bool,
    pub reward: f32,
    pub state: String,
    pub strategy: Action,
    pub pattern_stats: Option<PatternStats>,
}

/// Statistics snapshot of the learned state.
#[derive(Debug, Clone, Serialize)]
pub struct LearningStats {
    pub episodes: u64,
    pub total_reward: f64,
    pub exploration_rate: f64,
    pub replay_len: usize,
    pub replay_beta: f64,
    pub q_states: usize,
}

struct LearningState {
    q: DoubleQTable,
    ensemble: EnsembleSelector,
    replay: ReplayBuffer,
    reasoning: HashMap<(String, Action), ReasoningPattern>,
    episodes: u64,
    total_reward: f64,
    rng: StdRng,
}

/// Process-wide learning engine handle.
///
/// All shared mutable learning state sits behind one writer lock; the
/// arithmetic never suspends, and persistence happens outside the lock.
pub struct LearningEngine {
    storage: Arc<dyn StorageBackend>,
    registry: Arc<PatternRegistry>,
    config: EngineConfig,
    state: RwLock<LearningState>,
}

impl LearningEngine {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        registry: Arc<PatternRegistry>,
        config: EngineConfig,
    ) -> Self {
        let state = LearningState {
            q: DoubleQTable::new(config.learning_rate, config.learning_reward_decay),
            ensemble: EnsembleSelector::new(
                config.exploration_rate,
                config.min_exploration_rate,
                config.exploration_decay,
            ),
            replay: ReplayBuffer::new(config.replay_buffer_size),
            reasoning: HashMap::new(),
            episodes: 0,
            total_reward: 0.0,
            rng: StdRng::from_entropy(),
        };
        Self {
            storage,
            registry,
            config,
            state: RwLock::new(state),
        }
    }

    /// Deterministic RNG, for tests.
    pub fn with_rng_seed(self, seed: u64) -> Self {
        self.state.write().rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Restore persisted Q-table and replay tail from the store.
    pub async fn load_persisted(&self) -> Result<()> {
        let entries = self.storage.load_q_table().await?;
        let experiences = self
            .storage
            .load_replay(self.config.replay_buffer_size)
            .await?;
        let mut state = self.state.write();
        let loaded_entries = entries.len();
        let loaded_experiences = experiences.len();
        state.q.load(entries);
        state.replay.load(experiences);
        drop(state);
        info!(loaded_entries, loaded_experiences, "restored learning state");
        Ok(())
    }

    /// Pick a strategy for a request context via the ensemble vote.
    pub fn select_strategy(
        &self,
        genres: &[String],
        mood: Option<&str>,
        segment: UserSegment,
        content_type: ContentFilter,
        features: Option<[f64; LINUCB_DIM]>,
    ) -> Action {
        let state_string = state_key(genres, mood, segment, content_type);
        let mut state = self.state.write();
        let LearningState {
            q, ensemble, rng, ..
        } = &mut *state;
        let inputs = SelectionInputs {
            state: &state_string,
            q,
            features,
        };
        ensemble.select(&inputs, rng)
    }

    /// Ingest one feedback event.
    ///
    /// The durable feedback write, the pattern statistics update, and
    /// the in-memory learning updates are tied to the caller-supplied
    /// request id: a retry after a completed write changes nothing.
    pub async fn record_feedback(&self, input: FeedbackInput) -> Result<FeedbackOutcome> {
        if !self.config.learning_enabled {
            return Ok(FeedbackOutcome {
                recorded: false,
                reward: 0.0,
                state: String::new(),
                strategy: input.strategy.unwrap_or(Action::ContentBased),
                pattern_stats: None,
            });
        }

        let reward = reward_for(input.action, input.completion_percent, input.rating);
        let state_string = state_key(
            &input.genres,
            input.mood.as_deref(),
            input.segment,
            input.content_type,
        );
        let next_state = input
            .next_state
            .clone()
            .unwrap_or_else(|| state_string.clone());

        // Durable write first; a duplicate id means a retry of a
        // completed call, so the learning updates are skipped too.
        let record = LearningFeedback {
            id: input.request_id,
            user_id: input.user_id,
            content_id: input.content_id.clone(),
            pattern_id: input.pattern_id,
            was_successful: is_success(reward),
            reward,
            user_action: input.action,
            recommendation_position: input.recommendation_position,
            created_at: Utc::now(),
        };
        if !self.storage.insert_feedback(&record).await? {
            debug!(request_id = %input.request_id, "duplicate feedback request id; skipping");
            return Ok(FeedbackOutcome {
                recorded: false,
                reward,
                state: state_string,
                strategy: input.strategy.unwrap_or(Action::ContentBased),
                pattern_stats: None,
            });
        }

        let pattern_stats = match input.pattern_id {
            Some(pattern_id) => {
                self.registry
                    .record_outcome(pattern_id, is_success(reward), reward)
                    .await?
            }
            None => None,
        };

        // In-memory learning updates, all under one writer lock.
        let (episodes, strategy) = {
            let mut state = self.state.write();
            let strategy = match input.strategy {
                Some(strategy) => strategy,
                None => {
                    let LearningState {
                        q, ensemble, rng, ..
                    } = &mut *state;
                    let inputs = SelectionInputs {
                        state: &state_string,
                        q,
                        features: input.features,
                    };
                    ensemble.select(&inputs, rng)
                }
            };

            let reward_f64 = f64::from(reward);
            state
                .ensemble
                .update(strategy, reward_f64, input.features.as_ref());

            let td = state
                .q
                .td_error(&state_string, strategy, reward_f64, &next_state, false);
            {
                let LearningState { q, rng, .. } = &mut *state;
                q.update(&state_string, strategy, reward_f64, &next_state, false, rng);
            }

            state.replay.push(ReplayExperience {
                state: state_string.clone(),
                action: strategy,
                reward,
                next_state: next_state.clone(),
                done: false,
                context: ExperienceContext {
                    user_id: Some(input.user_id.to_string()),
                    content_id: input.content_id.clone(),
                    timestamp: Some(record.created_at),
                    mood: input.mood.clone(),
                    genres: input.genres.clone(),
                },
                priority: priority_for(td),
            });

            self.replay_pass(&mut state);

            // Reasoning pattern update for (state, action).
            let entry = state
                .reasoning
                .entry((state_string.clone(), strategy))
                .or_default();
            entry.uses += 1;
            let n = entry.uses as f32;
            let outcome = if is_success(reward) { 1.0 } else { 0.0 };
            entry.success_rate += (outcome - entry.success_rate) / n;
            entry.confidence = 1.0 - 1.0 / (n + 1.0);

            state.ensemble.decay_epsilon();
            state.episodes += 1;
            state.total_reward += reward_f64;
            (state.episodes, strategy)
        };

        if episodes % CHECKPOINT_INTERVAL == 0 {
            self.checkpoint().await?;
        }

        Ok(FeedbackOutcome {
            recorded: true,
            reward,
            state: state_string,
            strategy,
            pattern_stats,
        })
    }

    /// Replay a prioritized batch with importance-weighted rewards.
    fn replay_pass(&self, state: &mut LearningState) {
        if state.replay.len() < self.config.replay_batch_size {
            return;
        }
        let LearningState { q, replay, rng, .. } = &mut *state;
        let Some(batch) = replay.sample(self.config.replay_batch_size, rng) else {
            return;
        };
        let mut td_errors = Vec::with_capacity(batch.experiences.len());
        for (experience, weight) in batch.experiences.iter().zip(batch.weights.iter()) {
            let scaled_reward = f64::from(experience.reward) * weight;
            q.update(
                &experience.state,
                experience.action,
                scaled_reward,
                &experience.next_state,
                experience.done,
                rng,
            );
            td_errors.push(q.td_error(
                &experience.state,
                experience.action,
                f64::from(experience.reward),
                &experience.next_state,
                experience.done,
            ));
        }
        replay.update_priorities(&batch.indices, &td_errors);
    }

    /// Persist the Q-table and a replay tail.
    pub async fn checkpoint(&self) -> Result<()> {
        let (entries, tail, episodes) = {
            let state = self.state.read();
            (
                state.q.entries(),
                state.replay.tail(CHECKPOINT_REPLAY_TAIL),
                state.episodes,
            )
        };
        self.storage.persist_q_entries(&entries).await?;
        self.storage.persist_replay(&tail).await?;
        info!(episodes, q_entries = entries.len(), "checkpointed learning state");
        Ok(())
    }

    /// Multiplicative exploration decay used by the optimization cycle.
    pub fn scale_exploration(&self, factor: f64) {
        let floor = self.config.min_exploration_rate;
        self.state.write().ensemble.scale_epsilon(factor, floor);
    }

    /// Current exploration rate.
    pub fn exploration_rate(&self) -> f64 {
        self.state.read().ensemble.epsilon()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> LearningStats {
        let state = self.state.read();
        LearningStats {
            episodes: state.episodes,
            total_reward: state.total_reward,
            exploration_rate: state.ensemble.epsilon(),
            replay_len: state.replay.len(),
            replay_beta: state.replay.beta(),
            q_states: state.q.state_count(),
        }
    }
}
