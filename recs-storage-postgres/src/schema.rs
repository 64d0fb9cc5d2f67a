//! Database schema definitions for the Postgres backend.
//!
//! Vector columns use pgvector's `vector(384)` type with HNSW indexes
//! (`m = 16, ef_construction = 64`) over cosine distance. Full-text
//! search runs over a stored tsvector generated from title + overview.

/// pgvector extension bootstrap.
pub const CREATE_VECTOR_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS vector";

/// SQL to create the content table.
pub const CREATE_CONTENT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS content (
    id TEXT PRIMARY KEY,
    content_type TEXT NOT NULL,
    title TEXT NOT NULL,
    year INT,
    overview TEXT NOT NULL DEFAULT '',
    genres TEXT[] NOT NULL DEFAULT '{}',
    original_language TEXT,
    original_country TEXT,
    rating REAL,
    network_id INT,
    network_name TEXT,
    first_aired DATE,
    image_url TEXT,
    thumbnail_url TEXT,
    embedding vector(384),
    search_vector tsvector GENERATED ALWAYS AS (
        to_tsvector('english', coalesce(title, '') || ' ' || coalesce(overview, ''))
    ) STORED,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
";

/// SQL to create the user preferences table.
pub const CREATE_USER_PREFERENCES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS user_preferences (
    user_id UUID PRIMARY KEY,
    preference_vector vector(384),
    genre_weights JSONB NOT NULL DEFAULT '{}',
    network_weights JSONB NOT NULL DEFAULT '{}',
    watch_history JSONB NOT NULL DEFAULT '[]',
    ratings JSONB NOT NULL DEFAULT '{}',
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
";

/// SQL to create the recommendation patterns table.
pub const CREATE_PATTERNS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS recommendation_patterns (
    id BIGSERIAL PRIMARY KEY,
    pattern_type TEXT NOT NULL,
    approach TEXT NOT NULL,
    success_rate REAL NOT NULL DEFAULT 0,
    total_uses BIGINT NOT NULL DEFAULT 0,
    avg_reward REAL NOT NULL DEFAULT 0,
    user_segment TEXT NOT NULL DEFAULT 'any',
    time_of_day TEXT NOT NULL DEFAULT 'any',
    day_of_week TEXT NOT NULL DEFAULT 'any',
    platform TEXT NOT NULL DEFAULT 'any',
    content_type_preference TEXT NOT NULL DEFAULT 'both',
    top_genres TEXT[] NOT NULL DEFAULT '{}',
    embedding vector(384),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_used_at TIMESTAMPTZ,
    UNIQUE (pattern_type, approach)
)
";

/// SQL to create the learning feedback table.
pub const CREATE_FEEDBACK_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS learning_feedback (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    content_id TEXT NOT NULL,
    pattern_id BIGINT,
    was_successful BOOLEAN NOT NULL,
    reward REAL NOT NULL,
    user_action TEXT NOT NULL,
    recommendation_position INT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
";

/// SQL to create the reflexion episodes table.
pub const CREATE_REFLEXION_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS reflexion_episodes (
    id BIGSERIAL PRIMARY KEY,
    session_id TEXT NOT NULL,
    task TEXT NOT NULL,
    action TEXT NOT NULL,
    outcome TEXT NOT NULL,
    reward REAL NOT NULL,
    self_critique TEXT NOT NULL DEFAULT '',
    learnings JSONB NOT NULL DEFAULT '[]',
    embedding vector(384),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
";

/// SQL to create the skills table.
pub const CREATE_SKILLS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS skills (
    name TEXT PRIMARY KEY,
    description TEXT NOT NULL DEFAULT '',
    signature TEXT NOT NULL DEFAULT '',
    code TEXT NOT NULL DEFAULT '',
    domain TEXT NOT NULL DEFAULT '',
    success_rate REAL NOT NULL DEFAULT 0,
    usage_count BIGINT NOT NULL DEFAULT 0,
    avg_execution_time_ms DOUBLE PRECISION NOT NULL DEFAULT 0
)
";

/// SQL to create the Q-table.
pub const CREATE_Q_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS q_table (
    state TEXT NOT NULL,
    action TEXT NOT NULL,
    value REAL NOT NULL DEFAULT 0,
    updates INT NOT NULL DEFAULT 0,
    last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (state, action)
)
";

/// SQL to create the experience replay table.
pub const CREATE_REPLAY_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS experience_replay (
    id BIGSERIAL PRIMARY KEY,
    state TEXT NOT NULL,
    action TEXT NOT NULL,
    reward REAL NOT NULL,
    next_state TEXT NOT NULL,
    done BOOLEAN NOT NULL DEFAULT FALSE,
    context JSONB NOT NULL DEFAULT '{}',
    priority REAL NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
";

/// SQL to create the sync status table.
pub const CREATE_SYNC_STATUS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sync_status (
    id BIGSERIAL PRIMARY KEY,
    sync_type TEXT NOT NULL,
    last_sync_timestamp BIGINT NOT NULL DEFAULT 0,
    items_synced INT NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT '',
    metadata JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
";

/// HNSW index on content embeddings (cosine distance).
pub const CREATE_CONTENT_EMBEDDING_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_content_embedding
ON content USING hnsw (embedding vector_cosine_ops)
WITH (m = 16, ef_construction = 64)
";

/// HNSW index on pattern embeddings.
pub const CREATE_PATTERN_EMBEDDING_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_patterns_embedding
ON recommendation_patterns USING hnsw (embedding vector_cosine_ops)
WITH (m = 16, ef_construction = 64)
";

/// HNSW index on reflexion episode embeddings.
pub const CREATE_REFLEXION_EMBEDDING_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_reflexion_embedding
ON reflexion_episodes USING hnsw (embedding vector_cosine_ops)
WITH (m = 16, ef_construction = 64)
";

/// GIN index on the content full-text column.
pub const CREATE_CONTENT_SEARCH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_content_search
ON content USING gin (search_vector)
";

/// Btree index on content kind.
pub const CREATE_CONTENT_TYPE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_content_type ON content (content_type)
";

/// Btree index on content rating for popularity ordering.
pub const CREATE_CONTENT_RATING_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_content_rating ON content (rating)
";

/// Btree index on feedback recency.
pub const CREATE_FEEDBACK_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_feedback_created ON learning_feedback (created_at)
";

/// Btree index on feedback pattern references.
pub const CREATE_FEEDBACK_PATTERN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_feedback_pattern ON learning_feedback (pattern_id)
";

/// Every statement needed for a fresh database, in order.
pub const ALL_STATEMENTS: [&str; 18] = [
    CREATE_VECTOR_EXTENSION,
    CREATE_CONTENT_TABLE,
    CREATE_USER_PREFERENCES_TABLE,
    CREATE_PATTERNS_TABLE,
    CREATE_FEEDBACK_TABLE,
    CREATE_REFLEXION_TABLE,
    CREATE_SKILLS_TABLE,
    CREATE_Q_TABLE,
    CREATE_REPLAY_TABLE,
    CREATE_SYNC_STATUS_TABLE,
    CREATE_CONTENT_EMBEDDING_INDEX,
    CREATE_PATTERN_EMBEDDING_INDEX,
    CREATE_REFLEXION_EMBEDDING_INDEX,
    CREATE_CONTENT_SEARCH_INDEX,
    CREATE_CONTENT_TYPE_INDEX,
    CREATE_CONTENT_RATING_INDEX,
    CREATE_FEEDBACK_CREATED_INDEX,
    CREATE_FEEDBACK_PATTERN_INDEX,
];
