//! `recs stats`

use serde::Serialize;

use recs_core::learning::LearningStats;
use recs_core::patterns::RegistryStats;
use recs_core::RecsEngine;

use crate::output::{emit, OutputFormat};

#[derive(Serialize)]
struct StatsReport {
    content_count: u64,
    patterns: RegistryStats,
    learning: LearningStats,
    embedding_cache_hit_rate: f64,
    vector_cache_hit_rate: f64,
}

pub async fn run(engine: &RecsEngine, format: OutputFormat) -> anyhow::Result<()> {
    let report = StatsReport {
        content_count: engine.storage().content_count().await?,
        patterns: engine.registry().stats().await?,
        learning: engine.learning().stats(),
        embedding_cache_hit_rate: engine.embeddings().cache_metrics().hit_rate(),
        vector_cache_hit_rate: engine.recommendations().vector_cache_metrics().hit_rate(),
    };
    emit(format, &report, |r| {
        let mut lines = vec![
            format!("catalog items:      {}", r.content_count),
            format!(
                "patterns:           {} (avg success {:.2})",
                r.patterns.total_patterns, r.patterns.avg_success_rate
            ),
        ];
        let mut types: Vec<(&String, &usize)> = r.patterns.by_task_type.iter().collect();
        types.sort();
        for (task_type, count) in types {
            lines.push(format!("  {task_type:<17} {count}"));
        }
        lines.push(format!("episodes:           {}", r.learning.episodes));
        lines.push(format!("total reward:       {:.2}", r.learning.total_reward));
        lines.push(format!("exploration rate:   {:.3}", r.learning.exploration_rate));
        lines.push(format!(
            "replay buffer:      {} entries (beta {:.3})",
            r.learning.replay_len, r.learning.replay_beta
        ));
        lines.push(format!("q-table states:     {}", r.learning.q_states));
        lines.push(format!(
            "cache hit rates:    embeddings {:.0}% / vectors {:.0}%",
            r.embedding_cache_hit_rate * 100.0,
            r.vector_cache_hit_rate * 100.0
        ));
        lines.join("\n")
    })
}
