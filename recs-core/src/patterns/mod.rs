//! # Pattern Registry
//!
//! Learned recommendation strategies with context embeddings and
//! success statistics, plus semantic selection over them.

mod registry;
mod types;

pub use registry::{PatternRegistry, RegistryStats};
pub use types::{
    seed_patterns, PatternContext, PatternStats, PrunePolicy, RecommendationPattern, TaskType,
};
