//! End-to-end recommendation pipeline scenarios over the in-memory
//! backend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use recs_core::patterns::{PatternContext, RecommendationPattern};
use recs_core::recommend::safety;
use recs_core::types::{
    Audience, ContentKind, RecommendationRequest, UserPreference, WatchEvent,
};
use recs_core::{Content, EngineConfig, RecsEngine, TaskType};

fn content(id: &str, kind: ContentKind, genres: &[&str], rating: Option<f32>) -> Content {
    Content {
        id: id.to_string(),
        kind,
        title: format!("Title {id}"),
        year: Some(2021),
        overview: format!("Overview for {id}"),
        genres: genres.iter().map(|g| (*g).to_string()).collect(),
        original_language: Some("eng".into()),
        original_country: None,
        rating,
        network_id: None,
        network_name: None,
        first_aired: None,
        image_url: None,
        thumbnail_url: None,
        embedding: None,
        updated_at: Utc::now(),
    }
}

fn watch(id: &str) -> WatchEvent {
    WatchEvent {
        content_id: id.to_string(),
        timestamp: Utc::now(),
        duration_seconds: 1800,
        completion_percent: 100.0,
    }
}

async fn engine() -> RecsEngine {
    let engine = RecsEngine::in_memory(EngineConfig::default());
    engine.initialize().await.unwrap();
    engine
}

#[tokio::test]
async fn cold_start_rating_sorted_for_new_user() {
    let engine = engine().await;
    let pool = vec![
        content("A", ContentKind::Series, &["Drama"], Some(9.0)),
        content("B", ContentKind::Series, &["Comedy"], Some(8.0)),
        content("C", ContentKind::Movie, &["Action"], Some(7.5)),
    ];
    let request = RecommendationRequest::new("user-new", 3);

    let response = engine
        .recommendations()
        .get_recommendations(&request, None, pool)
        .await
        .unwrap();

    let ids: Vec<&str> = response.items.iter().map(|i| i.content_id.as_str()).collect();
    assert_eq!(ids, ["A", "B", "C"]);
    for (index, item) in response.items.iter().enumerate() {
        assert_eq!(item.position, index + 1);
        assert_eq!(item.reason.kind, TaskType::ColdStart);
        assert!(!item.reason.description.is_empty());
    }
    assert!(response.feedback.is_some());
}

#[tokio::test]
async fn genre_match_ranks_overlapping_items_first() {
    // No seeding here: a lone genre_match pattern guarantees selection
    // lands on it.
    let engine = RecsEngine::in_memory(EngineConfig::default());
    let mut pattern = RecommendationPattern::new(
        TaskType::GenreMatch,
        "Genre-weighted ranking for engaged users",
        PatternContext::any(),
    );
    pattern.success_rate = 0.99;
    engine.registry().upsert(pattern).await.unwrap();

    let mut preference = UserPreference::cold_start(Uuid::new_v4());
    preference.genre_weights = HashMap::from([
        ("Drama".to_string(), 0.9),
        ("Thriller".to_string(), 0.7),
        ("Comedy".to_string(), 0.1),
    ]);
    for i in 0..6 {
        preference.push_watch(watch(&format!("seen-{i}")));
    }

    let pool = vec![
        content("dt-1", ContentKind::Series, &["Drama", "Thriller"], Some(8.0)),
        content("dt-2", ContentKind::Series, &["Drama", "Thriller"], Some(7.0)),
        content("d-1", ContentKind::Series, &["Drama"], Some(9.0)),
        content("d-2", ContentKind::Series, &["Drama", "Romance"], Some(6.0)),
        content("com", ContentKind::Movie, &["Comedy"], Some(9.5)),
    ];
    let request = RecommendationRequest::new("user-genre", 3);

    let response = engine
        .recommendations()
        .get_recommendations(&request, Some(preference), pool)
        .await
        .unwrap();

    assert_eq!(response.items[0].reason.kind, TaskType::GenreMatch);
    let top2: Vec<&str> = response.items[..2].iter().map(|i| i.content_id.as_str()).collect();
    assert!(top2.contains(&"dt-1") && top2.contains(&"dt-2"), "top-2 was {top2:?}");
    assert!(
        response.items[..3].iter().all(|i| i.content_id != "com"),
        "comedy item must not reach the top-3"
    );
}

#[tokio::test]
async fn similar_content_with_zero_vector_falls_back_to_cold_start() {
    let engine = engine().await;

    // One watched, rated item but no computed preference vector: the
    // seeded similar_content pattern wins selection and must degrade.
    let mut preference = UserPreference::cold_start(Uuid::new_v4());
    preference.push_watch(watch("already-seen"));
    preference.ratings.insert("already-seen".into(), 8.0);

    let pool = vec![
        content("A", ContentKind::Series, &["Drama"], Some(9.0)),
        content("B", ContentKind::Series, &["Comedy"], Some(8.0)),
    ];
    let request = RecommendationRequest::new("user-zero-vec", 2);

    let response = engine
        .recommendations()
        .get_recommendations(&request, Some(preference), pool)
        .await
        .unwrap();

    assert_eq!(response.items.len(), 2);
    assert_eq!(response.items[0].content_id, "A");
    assert_eq!(response.items[0].reason.kind, TaskType::ColdStart);
}

#[tokio::test]
async fn limit_zero_returns_empty_not_error() {
    let engine = engine().await;
    let pool = vec![content("A", ContentKind::Series, &["Drama"], Some(9.0))];
    let request = RecommendationRequest::new("user-1", 0);
    let response = engine
        .recommendations()
        .get_recommendations(&request, None, pool)
        .await
        .unwrap();
    assert!(response.items.is_empty());
}

#[tokio::test]
async fn limit_is_clamped_to_max() {
    let engine = engine().await;
    let pool: Vec<Content> = (0..150)
        .map(|i| content(&format!("c{i:03}"), ContentKind::Movie, &["Drama"], Some(5.0)))
        .collect();
    let request = RecommendationRequest::new("user-1", 500);
    let response = engine
        .recommendations()
        .get_recommendations(&request, None, pool)
        .await
        .unwrap();
    assert_eq!(response.items.len(), 100);
}

#[tokio::test]
async fn empty_pool_yields_cold_start_note() {
    let engine = engine().await;
    let request = RecommendationRequest::new("user-1", 10);
    let response = engine
        .recommendations()
        .get_recommendations(&request, None, Vec::new())
        .await
        .unwrap();
    assert!(response.items.is_empty());
    let note = response.note.unwrap();
    assert_eq!(note.kind, TaskType::ColdStart);
    assert!(!note.description.is_empty());
}

#[tokio::test]
async fn exclude_watched_removes_history_items() {
    let engine = engine().await;
    let mut preference = UserPreference::cold_start(Uuid::new_v4());
    preference.push_watch(watch("seen"));

    let pool = vec![
        content("seen", ContentKind::Series, &["Drama"], Some(9.9)),
        content("fresh", ContentKind::Series, &["Drama"], Some(5.0)),
    ];
    let mut request = RecommendationRequest::new("user-1", 10);
    request.exclude_watched = true;

    let response = engine
        .recommendations()
        .get_recommendations(&request, Some(preference), pool)
        .await
        .unwrap();
    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].content_id, "fresh");
}

#[tokio::test]
async fn kids_request_with_unfiltered_horror_fails_closed() {
    let engine = engine().await;

    // The upstream pre-filter "forgot" the horror item; the engine must
    // catch it at assembly, return empty, and credit no pattern.
    let pool = vec![
        content("safe", ContentKind::Series, &["Animation"], Some(8.0)),
        content("scary", ContentKind::Movie, &["Horror"], Some(9.5)),
    ];
    let mut request = RecommendationRequest::new("kid-user", 5);
    request.context.audience = Some(Audience::Kids);

    let response = engine
        .recommendations()
        .get_recommendations(&request, None, pool)
        .await
        .unwrap();
    assert!(response.items.is_empty(), "must fail closed, not return unsafe items");
    assert!(response.feedback.is_none(), "no pattern may be credited");
}

#[tokio::test]
async fn kids_request_with_prefiltered_pool_succeeds() {
    let engine = engine().await;
    let raw_pool = vec![
        content("safe", ContentKind::Series, &["Animation"], Some(8.0)),
        content("scary", ContentKind::Movie, &["Horror"], Some(9.5)),
    ];
    let pool = safety::filter_pool(raw_pool, Audience::Kids, &safety::default_blocklist());

    let mut request = RecommendationRequest::new("kid-user", 5);
    request.context.audience = Some(Audience::Kids);

    let response = engine
        .recommendations()
        .get_recommendations(&request, None, pool)
        .await
        .unwrap();
    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].content_id, "safe");
}

#[tokio::test]
async fn unknown_user_never_errors() {
    let engine = engine().await;
    let pool = vec![content("A", ContentKind::Series, &["Drama"], Some(7.0))];
    let request = RecommendationRequest::new("nobody-knows-this-user", 5);
    let response = engine
        .recommendations()
        .get_recommendations(&request, None, pool)
        .await
        .unwrap();
    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].reason.kind, TaskType::ColdStart);
}
