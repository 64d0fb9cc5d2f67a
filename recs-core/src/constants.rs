//! Hard constants shared across the engine.
//!
//! Values here are part of the learned-state contract: changing them
//! invalidates persisted Q-tables, pattern statistics, or replay
//! priorities. Tunable knobs live in [`crate::config::EngineConfig`].

/// Embedding dimension for all vector columns.
pub const EMBEDDING_DIM: usize = 384;

/// Tolerance for the unit-norm invariant on stored embeddings.
pub const NORM_TOLERANCE: f32 = 1e-4;

/// Pattern score weight on semantic similarity.
pub const PATTERN_SIMILARITY_WEIGHT: f32 = 0.4;

/// Pattern score weight on historical success rate.
pub const PATTERN_SUCCESS_WEIGHT: f32 = 0.6;

/// How many nearest patterns are considered by `find_best_pattern`.
pub const PATTERN_CANDIDATES: usize = 5;

/// Watch history is trimmed to the most recent entries.
pub const WATCH_HISTORY_LIMIT: usize = 100;

/// UCB bonus coefficient for the epsilon-greedy selector.
pub const EPSILON_GREEDY_UCB_C: f64 = 0.1;

/// Exploration constant for UCB1.
pub const UCB1_C: f64 = 2.0;

/// LinUCB exploration multiplier.
pub const LINUCB_ALPHA: f64 = 1.0;

/// LinUCB context feature dimension.
pub const LINUCB_DIM: usize = 10;

/// Prioritized replay: priority exponent.
pub const REPLAY_PRIORITY_ALPHA: f64 = 0.6;

/// Prioritized replay: priority floor added to |TD error|.
pub const REPLAY_PRIORITY_EPSILON: f64 = 0.01;

/// Importance-sampling exponent starting value.
pub const REPLAY_BETA_INITIAL: f64 = 0.4;

/// Importance-sampling exponent annealing step per sampled batch.
pub const REPLAY_BETA_STEP: f64 = 0.001;

/// Q-table, patterns, and a replay tail are persisted every N episodes.
pub const CHECKPOINT_INTERVAL: u64 = 50;

/// Replay tail length persisted at each checkpoint.
pub const CHECKPOINT_REPLAY_TAIL: usize = 100;

/// Cosine similarity floor for cluster pair mining.
pub const CLUSTER_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Pair mining stops after this many pairs.
pub const CLUSTER_MAX_PAIRS: usize = 500;

/// Clusters below this size are discarded.
pub const CLUSTER_MIN_SIZE: usize = 3;

/// Feedback window read by the optimization cycle, in days.
pub const FEEDBACK_WINDOW_DAYS: i64 = 7;

/// Embedding drift: shrink factor toward the genre centroid.
pub const CENTROID_SHRINK_FACTOR: f32 = 0.05;

/// Optimization cycle exploration decay multiplier.
pub const CYCLE_EXPLORATION_DECAY: f64 = 0.99;

/// Rows sampled for the cycle quality measurement.
pub const QUALITY_SAMPLE_SIZE: usize = 100;

/// Advisory lock key for the singleton optimization cycle.
pub const OPTIMIZATION_CYCLE_LOCK: &str = "optimization_cycle";

/// HNSW index parameter: max connections per node.
pub const HNSW_M: u32 = 16;

/// HNSW index parameter: construction-time candidate list size.
pub const HNSW_EF_CONSTRUCTION: u32 = 64;
