#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::float_cmp)]

//! # Recs Core
//!
//! Core of a self-learning content recommendation engine for television
//! and film catalogs.
//!
//! Three tightly coupled subsystems share one store and one embedding
//! service:
//!
//! - **Recommendation**: pattern-driven strategy selection over a
//!   candidate pool, with diversification and audience safety.
//! - **Learning**: rewards from user interactions feed per-pattern
//!   statistics, a double Q-table, a bandit ensemble, and a prioritized
//!   replay buffer.
//! - **Optimization**: a scheduled cycle that mines embedding clusters
//!   into new patterns, aggregates rewards by genre, and drifts
//!   embeddings toward high-reward regions.
//!
//! ## Quick start
//!
//! ```no_run
//! use recs_core::{EngineConfig, RecsEngine};
//!
//! #[tokio::main]
//! async fn main() -> recs_core::Result<()> {
//!     let engine = RecsEngine::in_memory(EngineConfig::default());
//!     engine.initialize().await?;
//!
//!     let request = recs_core::types::RecommendationRequest::new("user-1", 10);
//!     let pool = engine.storage().list_content_with_embeddings(1000).await?;
//!     let response = engine
//!         .recommendations()
//!         .get_recommendations(&request, None, pool)
//!         .await?;
//!     println!("{} items", response.items.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module organization
//!
//! - [`embedding`]: text-to-vector with caching, vector geometry
//! - [`storage`]: backend trait and the in-memory implementation
//! - [`patterns`]: pattern registry with semantic selection
//! - [`recommend`]: the request pipeline
//! - [`learning`]: Q-learning, bandits, replay, feedback ingestion
//! - [`optimize`]: the background optimization cycle
//! - [`reflexion`]: episode memory and skills
//! - [`retrieval`]: vector-result caching

pub mod config;
pub mod constants;
pub mod embedding;
mod engine;
pub mod error;
pub mod learning;
pub mod optimize;
pub mod patterns;
pub mod recommend;
pub mod reflexion;
pub mod retrieval;
pub mod storage;
pub mod types;

pub use config::{ColdStartStrategy, EngineConfig};
pub use engine::RecsEngine;
pub use error::{Error, Result};
pub use learning::{Action, FeedbackInput, LearningEngine};
pub use patterns::{PatternContext, PatternRegistry, RecommendationPattern, TaskType};
pub use recommend::RecommendationEngine;
pub use storage::{MemoryStorage, SearchFilter, StorageBackend, VectorTable};
pub use types::{
    Audience, Content, ContentKind, LearningFeedback, RecommendationRequest,
    RecommendationResponse, UserAction, UserPreference,
};
