//! # Learning Engine
//!
//! Closed-loop reinforcement learning: reward shaping, a double
//! Q-table, a four-selector bandit ensemble, prioritized experience
//! replay, and periodic persistence of the learned state.

mod bandits;
mod engine;
mod qtable;
mod replay;
pub mod reward;
mod state;

pub use bandits::{EnsembleSelector, SelectionInputs, Selector};
pub use engine::{FeedbackInput, FeedbackOutcome, LearningEngine, LearningStats};
pub use qtable::{DoubleQTable, QEntry};
pub use replay::{ExperienceContext, ReplayBatch, ReplayBuffer, ReplayExperience};
pub use reward::{is_success, reward_for};
pub use state::{state_key, Action};
