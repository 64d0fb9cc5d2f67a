//! # Recommendation Engine
//!
//! Context to ranked list: segmentation, pattern-driven strategy
//! dispatch, diversification, filtering, and audience safety.

mod context;
mod diversify;
mod engine;
pub mod safety;
pub mod strategies;

pub use context::{resolve_context, ResolvedContext};
pub use diversify::diversify;
pub use engine::{audience_is_restricted, RecommendationEngine};
pub use strategies::ScoredCandidate;
