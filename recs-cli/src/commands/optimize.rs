//! `recs optimize`

use recs_core::RecsEngine;

use crate::output::{emit, OutputFormat};

pub async fn run(engine: &RecsEngine, format: OutputFormat) -> anyhow::Result<()> {
    match engine.cycle().run().await? {
        Some(metrics) => emit(format, &metrics, |m| {
            format!(
                "cycle complete: {} clusters, {} patterns updated, {} embeddings optimized\n\
                 best strategy: {}\n\
                 quality score: {:.4} ({:+.4} vs previous)",
                m.clusters_identified,
                m.patterns_updated,
                m.total_optimized,
                m.best_strategy,
                m.quality_score,
                m.quality_improvement,
            )
        }),
        None => {
            emit(format, &serde_json::json!({"skipped": true}), |_| {
                "another optimization cycle is already running".to_string()
            })
        }
    }
}
