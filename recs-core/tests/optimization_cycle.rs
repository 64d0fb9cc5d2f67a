//! Optimization cycle behavior over the in-memory backend.

use chrono::Utc;
use uuid::Uuid;

use recs_core::embedding::geometry::l2_normalize;
use recs_core::learning::FeedbackInput;
use recs_core::types::{ContentFilter, ContentKind, UserAction, UserSegment};
use recs_core::{Action, Content, EngineConfig, RecsEngine, TaskType};

/// Ten items: five Drama-primary and five Thriller-primary, all within
/// a tight embedding cone so every pair clears the 0.75 threshold.
fn clustered_pool(dimension: usize) -> Vec<Content> {
    (0..10)
        .map(|i| {
            let mut v = vec![0.0f32; dimension];
            v[0] = 1.0;
            v[1] = 0.02 * i as f32;
            let genres = if i % 2 == 0 {
                vec!["Drama".to_string(), "Thriller".to_string()]
            } else {
                vec!["Thriller".to_string(), "Drama".to_string()]
            };
            Content {
                id: format!("cl-{i}"),
                kind: ContentKind::Series,
                title: format!("Clustered {i}"),
                year: Some(2022),
                overview: String::new(),
                genres,
                original_language: None,
                original_country: None,
                rating: Some(8.0),
                network_id: None,
                network_name: None,
                first_aired: None,
                image_url: None,
                thumbnail_url: None,
                embedding: Some(l2_normalize(&v)),
                updated_at: Utc::now(),
            }
        })
        .collect()
}

#[tokio::test]
async fn cycle_synthesizes_cluster_pattern() {
    let engine = RecsEngine::in_memory(EngineConfig::default());
    engine.initialize().await.unwrap();
    let dimension = engine.config().embedding_dimension;
    engine
        .storage()
        .upsert_content(&clustered_pool(dimension))
        .await
        .unwrap();

    let metrics = engine.cycle().run().await.unwrap().unwrap();
    assert!(metrics.clusters_identified >= 1);
    assert!(metrics.patterns_updated >= 1);

    let patterns = engine.storage().list_patterns().await.unwrap();
    let custom = patterns
        .iter()
        .find(|p| p.task_type == TaskType::Custom)
        .expect("a cluster pattern must be synthesized");
    assert!(
        custom.approach.contains("Drama + Thriller"),
        "approach was: {}",
        custom.approach
    );
    assert!((0.7..=0.9).contains(&custom.success_rate));
    assert!(custom.total_uses >= 5);
}

#[tokio::test]
async fn consecutive_cycles_without_feedback_are_idempotent() {
    let engine = RecsEngine::in_memory(EngineConfig::default());
    engine.initialize().await.unwrap();
    let dimension = engine.config().embedding_dimension;
    engine
        .storage()
        .upsert_content(&clustered_pool(dimension))
        .await
        .unwrap();

    let first = engine.cycle().run().await.unwrap().unwrap();
    let patterns_after_first = engine.storage().list_patterns().await.unwrap();

    let second = engine.cycle().run().await.unwrap().unwrap();
    let patterns_after_second = engine.storage().list_patterns().await.unwrap();

    assert_eq!(patterns_after_first.len(), patterns_after_second.len());
    for (a, b) in patterns_after_first.iter().zip(patterns_after_second.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.approach, b.approach);
        assert_eq!(a.total_uses, b.total_uses);
        assert!((a.success_rate - b.success_rate).abs() < 1e-6);
    }
    assert!(
        (first.quality_score - second.quality_score).abs() < 1e-9,
        "quality must be stable with no interleaving writes"
    );
    assert_eq!(second.best_strategy, "none");
    assert_eq!(second.total_optimized, 0);
}

#[tokio::test]
async fn cycle_drifts_best_genre_after_feedback() {
    let engine = RecsEngine::in_memory(EngineConfig::default());
    engine.initialize().await.unwrap();
    let dimension = engine.config().embedding_dimension;
    engine
        .storage()
        .upsert_content(&clustered_pool(dimension))
        .await
        .unwrap();

    // Positive feedback on a Drama-primary item.
    engine
        .learning()
        .record_feedback(FeedbackInput {
            request_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content_id: "cl-0".into(),
            pattern_id: None,
            action: UserAction::Completed,
            completion_percent: Some(100.0),
            rating: None,
            recommendation_position: Some(1),
            strategy: Some(Action::ContentBased),
            genres: vec!["Drama".into()],
            mood: None,
            segment: UserSegment::Casual,
            content_type: ContentFilter::All,
            next_state: None,
            features: None,
        })
        .await
        .unwrap();

    let before: Vec<Option<Vec<f32>>> = {
        let rows = engine.storage().list_content_with_embeddings(100).await.unwrap();
        rows.iter().map(|c| c.embedding.clone()).collect()
    };

    let metrics = engine.cycle().run().await.unwrap().unwrap();
    assert_eq!(metrics.best_strategy, "genre_Drama");
    assert!(metrics.total_optimized >= 2, "drama members must drift");

    let after = engine.storage().list_content_with_embeddings(100).await.unwrap();
    // Every embedding stays unit-norm after the drift.
    for row in &after {
        let norm: f32 = row
            .embedding
            .as_ref()
            .unwrap()
            .iter()
            .map(|v| v * v)
            .sum::<f32>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
    // And something actually moved.
    let moved = after
        .iter()
        .zip(before.iter())
        .any(|(row, old)| row.embedding != *old);
    assert!(moved);
}

#[tokio::test]
async fn cycle_writes_learning_state_checkpoint() {
    let engine = RecsEngine::in_memory(EngineConfig::default());
    engine.initialize().await.unwrap();

    engine.cycle().run().await.unwrap().unwrap();
    let status = engine
        .storage()
        .last_sync_status("learning_state")
        .await
        .unwrap()
        .expect("cycle must checkpoint");
    assert_eq!(status.status, "completed");
    assert!(status.metadata.get("exploration_rate").is_some());
    assert!(status.metadata.get("quality_score").is_some());
    assert!(status.metadata.get("best_strategy").is_some());
}

#[tokio::test]
async fn cycle_skips_when_lock_is_held() {
    let engine = RecsEngine::in_memory(EngineConfig::default());
    engine.initialize().await.unwrap();
    engine
        .storage()
        .try_advisory_lock("optimization_cycle")
        .await
        .unwrap();
    let outcome = engine.cycle().run().await.unwrap();
    assert!(outcome.is_none(), "a held lock must skip the cycle");
}
