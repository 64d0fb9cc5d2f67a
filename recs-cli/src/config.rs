//! Configuration loading: TOML file, then environment overrides, then
//! defaults.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use recs_core::embedding::MockEmbeddingModel;
use recs_core::{EngineConfig, RecsEngine};
use recs_storage_postgres::PostgresStorage;

/// Load configuration and wire the engine.
///
/// `RECS_DATABASE_URL` overrides the file's `database_url`. With no
/// database configured the in-memory backend is used, which is only
/// useful for smoke tests since it forgets everything on exit.
pub async fn load_and_build(path: Option<&Path>) -> anyhow::Result<RecsEngine> {
    let mut config = load_config(path)?;
    if let Ok(url) = std::env::var("RECS_DATABASE_URL") {
        if !url.is_empty() {
            config.database_url = Some(url);
        }
    }
    config.validate()?;
    build_engine(config).await
}

/// Parse the TOML file, or defaults when absent.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config: EngineConfig =
                toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

async fn build_engine(config: EngineConfig) -> anyhow::Result<RecsEngine> {
    // The deterministic hash model stands in until a real embedding
    // provider is configured; vectors are stable but carry no
    // semantics.
    let model = Arc::new(MockEmbeddingModel::new(config.embedding_dimension));

    let engine = match &config.database_url {
        Some(url) => {
            let storage = PostgresStorage::connect(url).await?;
            storage.initialize_schema().await?;
            tracing::info!("using Postgres storage");
            RecsEngine::new(Arc::new(storage), model, config)
        }
        None => {
            tracing::warn!("no database_url configured; using in-memory storage");
            RecsEngine::new(Arc::new(recs_core::MemoryStorage::new()), model, config)
        }
    };
    engine.initialize().await?;
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.rec_default_limit, 20);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rec_default_limit = 7\nexploration_rate = 0.2").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.rec_default_limit, 7);
        assert!((config.exploration_rate - 0.2).abs() < 1e-9);
        // Unspecified keys keep their defaults.
        assert_eq!(config.rec_max_limit, 100);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rec_default_limit = \"many\"").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }
}
