#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_docs_in_private_items)]

//! # Recs Storage - Postgres
//!
//! Durable storage backend over PostgreSQL with the pgvector extension.
//!
//! This crate provides:
//! - Schema creation with HNSW vector indexes and full-text search
//! - The [`recs_core::StorageBackend`] implementation
//! - Retry with exponential backoff for transient failures
//! - Advisory locking for the singleton optimization cycle
//!
//! ## Example
//!
//! ```no_run
//! use recs_storage_postgres::PostgresStorage;
//!
//! # async fn example() -> recs_core::Result<()> {
//! let storage = PostgresStorage::connect("postgres://localhost/recs").await?;
//! storage.initialize_schema().await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod rows;
pub mod schema;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use tracing::{info, warn};

use recs_core::{Error, Result};

/// Retry configuration for transient failures.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum attempts per operation.
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds).
    pub retry_base_delay_ms: u64,
    /// Backoff cap (milliseconds).
    pub retry_max_delay_ms: u64,
    /// Pool size; defaults to `num_cpus * 2`.
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 2_000,
            max_connections: (num_cpus::get() * 2) as u32,
        }
    }
}

/// Postgres + pgvector storage backend.
pub struct PostgresStorage {
    pool: PgPool,
    config: PostgresConfig,
    /// Connection pinned while the advisory lock is held; pg advisory
    /// locks are session-scoped, so unlocking must reuse it.
    lock_connection: tokio::sync::Mutex<Option<PoolConnection<Postgres>>>,
}

impl PostgresStorage {
    /// Connect with default configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with(database_url, PostgresConfig::default()).await
    }

    /// Connect with explicit configuration.
    pub async fn connect_with(database_url: &str, config: PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        info!(max_connections = config.max_connections, "connected to Postgres");
        Ok(Self {
            pool,
            config,
            lock_connection: tokio::sync::Mutex::new(None),
        })
    }

    /// Create every table and index. Idempotent.
    pub async fn initialize_schema(&self) -> Result<()> {
        for statement in schema::ALL_STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        info!("schema initialized");
        Ok(())
    }

    /// Pool handle for ad-hoc queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run an operation with exponential backoff on transient errors.
    pub(crate) async fn with_retry<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Err(e) if e.is_recoverable() && attempt + 1 < self.config.max_retries => {
                    let delay = self
                        .config
                        .retry_base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt))
                        .min(self.config.retry_max_delay_ms);
                    warn!(attempt, delay_ms = delay, error = %e, "transient store error; retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Classify a sqlx error into the engine's transient/permanent split.
pub(crate) fn map_sqlx_error(error: sqlx::Error) -> Error {
    match &error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            Error::StoreTransient(error.to_string())
        }
        sqlx::Error::Database(db) => {
            // 40001 serialization failure, 40P01 deadlock, 55P03 lock
            // not available, 57014 query canceled.
            let transient = matches!(
                db.code().as_deref(),
                Some("40001" | "40P01" | "55P03" | "57014")
            );
            if transient {
                Error::StoreTransient(error.to_string())
            } else {
                Error::StorePermanent(error.to_string())
            }
        }
        _ => Error::StorePermanent(error.to_string()),
    }
}

/// Serialize a vector into pgvector's text format.
pub(crate) fn format_vector(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 2);
    out.push('[');
    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&value.to_string());
    }
    out.push(']');
    out
}

/// Parse pgvector's text format `[0.1,0.2,...]`.
pub(crate) fn parse_vector(text: &str) -> Option<Vec<f32>> {
    let trimmed = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    trimmed
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_text_round_trip() {
        let v = vec![0.25f32, -1.0, 0.0, 3.5];
        let text = format_vector(&v);
        assert_eq!(text, "[0.25,-1,0,3.5]");
        assert_eq!(parse_vector(&text).unwrap(), v);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_vector("not a vector").is_none());
        assert!(parse_vector("[a,b]").is_none());
        assert_eq!(parse_vector("[]").unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn default_config_sizes_pool_from_cpus() {
        let config = PostgresConfig::default();
        assert_eq!(config.max_connections as usize, num_cpus::get() * 2);
        assert_eq!(config.max_retries, 3);
    }
}
