//! `recs seed`

use recs_core::RecsEngine;

use crate::output::{emit, OutputFormat};

pub async fn run(engine: &RecsEngine, format: OutputFormat) -> anyhow::Result<()> {
    let installed = engine.registry().ensure_seeded().await?;
    emit(format, &serde_json::json!({ "installed": installed }), |_| {
        if installed == 0 {
            "patterns already seeded".to_string()
        } else {
            format!("installed {installed} initial patterns")
        }
    })
}
