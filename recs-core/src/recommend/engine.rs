//! The recommendation pipeline.
//!
//! Context resolution, pattern selection, strategy dispatch,
//! diversification, watched filtering, safety verification, and
//! position assignment. The pipeline carries a deadline: when the
//! vector index is slow it degrades to a popularity ranking instead of
//! surfacing an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::patterns::{PatternRegistry, RecommendationPattern, TaskType};
use crate::retrieval::{VectorCacheKey, VectorResultCache};
use crate::storage::{SearchFilter, StorageBackend, VectorTable};
use crate::types::{
    Audience, Content, ContentFilter, FeedbackHandle, Reason, RecommendationItem,
    RecommendationRequest, RecommendationResponse, UserPreference, UserSegment,
};

use super::context::{resolve_context, ResolvedContext};
use super::diversify::diversify;
use super::safety;
use super::strategies::{self, ScoredCandidate};

/// Recommendation engine over a storage backend and pattern registry.
pub struct RecommendationEngine {
    storage: Arc<dyn StorageBackend>,
    registry: Arc<PatternRegistry>,
    vector_cache: Arc<VectorResultCache>,
    config: EngineConfig,
    blocklist: Vec<String>,
}

impl RecommendationEngine {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        registry: Arc<PatternRegistry>,
        config: EngineConfig,
    ) -> Self {
        let vector_cache = Arc::new(VectorResultCache::new(
            config.vector_cache_entries,
            Duration::from_secs(config.vector_cache_ttl_secs),
        ));
        Self {
            storage,
            registry,
            vector_cache,
            config,
            blocklist: safety::default_blocklist(),
        }
    }

    /// Generate a ranked, diversified recommendation list.
    ///
    /// An unknown user (no preference profile) takes the cold-start
    /// path. The response is always an array; a safety violation at
    /// assembly fails closed to an empty one.
    pub async fn get_recommendations(
        &self,
        request: &RecommendationRequest,
        preference: Option<UserPreference>,
        pool: Vec<Content>,
    ) -> Result<RecommendationResponse> {
        let started = Instant::now();
        if request.user_id.trim().is_empty() {
            return Err(Error::InvalidInput("empty user id".into()));
        }
        let limit = request.limit.min(self.config.rec_max_limit);
        if limit == 0 {
            return Ok(RecommendationResponse::empty());
        }

        let preference = preference.unwrap_or_else(|| {
            UserPreference::cold_start(
                Uuid::parse_str(&request.user_id).unwrap_or_else(|_| Uuid::nil()),
            )
        });
        let resolved = resolve_context(request, &preference, Local::now());

        // The caller owns the audience pre-filter on the pool (see
        // [`safety::filter_pool`]); the engine re-verifies at assembly
        // and fails closed. Only the kind filter applies here.
        let mut pool = pool;
        pool.retain(|c| request.content_type.accepts(c.kind));

        if pool.is_empty() {
            return Ok(RecommendationResponse::empty_with_note(Reason {
                kind: TaskType::ColdStart,
                description: "No catalog items available for this request".to_string(),
            }));
        }

        // Pattern selection; new users route straight to cold start.
        let pattern = if resolved.segment == UserSegment::New {
            None
        } else {
            match self.registry.find_best_pattern(&resolved.pattern_context()).await {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!(error = %e, "pattern selection failed; degrading to cold start");
                    None
                }
            }
        };
        let task_type = pattern.as_ref().map_or(TaskType::ColdStart, |p| p.task_type);

        let (ranked, used_type, description) = self
            .dispatch(task_type, pattern.as_ref(), request, &preference, &resolved, &pool, limit, started)
            .await;

        // Diversify over the full ranking, then filter watched.
        let mut ranked = diversify(ranked, self.config.rec_diversity_factor);
        if request.exclude_watched {
            let watched: Vec<&str> = preference
                .watch_history
                .iter()
                .map(|w| w.content_id.as_str())
                .collect();
            ranked.retain(|c| !watched.contains(&c.content.id.as_str()));
        }
        ranked.truncate(limit);

        // Fail closed on any safety violation that survived to assembly.
        if let Some(audience) = resolved.audience {
            let selected: Vec<Content> = ranked.iter().map(|c| c.content.clone()).collect();
            let violations = safety::find_violations(&selected, audience, &self.blocklist);
            if !violations.is_empty() {
                let violation = Error::SafetyViolation {
                    audience,
                    content_ids: violations,
                };
                error!(error = %violation, "unsafe items reached response assembly; failing closed");
                return Ok(RecommendationResponse::empty());
            }
        }

        let items = ranked
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| RecommendationItem {
                content_id: candidate.content.id.clone(),
                title: candidate.content.title.clone(),
                score: candidate.score,
                position: index + 1,
                reason: Reason {
                    kind: used_type,
                    description: description.clone(),
                },
            })
            .collect();

        debug!(
            strategy = %used_type,
            pattern_id = pattern.as_ref().map(|p| p.id),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "assembled recommendation response"
        );
        Ok(RecommendationResponse {
            items,
            feedback: Some(FeedbackHandle {
                request_id: Uuid::new_v4(),
                pattern_id: pattern.map(|p| p.id),
            }),
            note: None,
        })
    }

    /// Cache metrics for the stats surface.
    pub fn vector_cache_metrics(&self) -> crate::retrieval::CacheMetrics {
        self.vector_cache.metrics()
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        task_type: TaskType,
        pattern: Option<&RecommendationPattern>,
        request: &RecommendationRequest,
        preference: &UserPreference,
        resolved: &ResolvedContext,
        pool: &[Content],
        limit: usize,
        started: Instant,
    ) -> (Vec<ScoredCandidate>, TaskType, String) {
        let cold = || {
            (
                strategies::cold_start(
                    pool,
                    request.genres.as_deref(),
                    self.config.rec_cold_start_strategy,
                ),
                TaskType::ColdStart,
                "Popular content you might enjoy".to_string(),
            )
        };

        match task_type {
            TaskType::ColdStart => cold(),
            TaskType::GenreMatch => {
                let description = if resolved.top_genres.is_empty() {
                    "Matched to your genre preferences".to_string()
                } else {
                    format!("Matches your favorite genres: {}", resolved.top_genres.join(", "))
                };
                (
                    strategies::genre_match(pool, &preference.genre_weights, &resolved.top_genres),
                    TaskType::GenreMatch,
                    description,
                )
            }
            TaskType::SimilarContent => match self
                .similar_ranking(request, preference, resolved, pool, limit, started)
                .await
            {
                Some(ranked) => (
                    ranked,
                    TaskType::SimilarContent,
                    "Similar to titles you've watched".to_string(),
                ),
                None => cold(),
            },
            TaskType::TimeBased => {
                let base = match self
                    .similar_ranking(request, preference, resolved, pool, limit, started)
                    .await
                {
                    Some(ranked) => ranked,
                    None => strategies::cold_start(
                        pool,
                        request.genres.as_deref(),
                        self.config.rec_cold_start_strategy,
                    ),
                };
                (
                    strategies::time_based(base, resolved.time_of_day),
                    TaskType::TimeBased,
                    format!("Picked for {} viewing", resolved.time_of_day.as_str()),
                )
            }
            TaskType::NetworkBased => match strategies::network_based(pool, preference) {
                Some(ranked) => (
                    ranked,
                    TaskType::NetworkBased,
                    "From networks you watch most".to_string(),
                ),
                None => cold(),
            },
            TaskType::Custom => {
                // Cluster-mined patterns carry their genres in context;
                // score them uniformly.
                let genres = pattern.map(|p| p.context.top_genres.clone()).unwrap_or_default();
                if genres.is_empty() {
                    cold()
                } else {
                    let description = pattern
                        .map(|p| p.approach.clone())
                        .unwrap_or_else(|| "Matched to a learned viewing cluster".to_string());
                    let uniform: std::collections::HashMap<String, f32> =
                        genres.iter().map(|g| (g.clone(), 1.0)).collect();
                    (
                        strategies::genre_match(pool, &uniform, &genres),
                        TaskType::Custom,
                        description,
                    )
                }
            }
        }
    }

    /// Similar-content ranking through the ANN index, or `None` when the
    /// preference vector is zero, the deadline expired, or the search
    /// failed. Callers fall back to cold start.
    async fn similar_ranking(
        &self,
        request: &RecommendationRequest,
        preference: &UserPreference,
        resolved: &ResolvedContext,
        pool: &[Content],
        limit: usize,
        started: Instant,
    ) -> Option<Vec<ScoredCandidate>> {
        if !preference.has_vector() {
            return None;
        }

        let mut filter = SearchFilter {
            genres_any: request.genres.clone().unwrap_or_default(),
            ..SearchFilter::default()
        };
        filter.kind = match request.content_type {
            ContentFilter::Series => Some(crate::types::ContentKind::Series),
            ContentFilter::Movie => Some(crate::types::ContentKind::Movie),
            ContentFilter::All => None,
        };
        if let Some(audience) = resolved.audience {
            filter.exclude_genres = safety::excluded_genres(audience)
                .iter()
                .map(|g| (*g).to_string())
                .collect();
        }
        if request.exclude_watched {
            filter.exclude_ids = preference
                .watch_history
                .iter()
                .map(|w| w.content_id.clone())
                .collect();
        }

        // Request twice the limit so diversification has material.
        let k = limit * 2;
        let deadline = Duration::from_millis(self.config.rec_deadline_ms);
        let remaining = deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            warn!("recommendation deadline exhausted before vector search");
            return None;
        }

        let key = VectorCacheKey::new(
            VectorTable::Content,
            &preference.vector,
            k,
            &filter.fingerprint(),
        );
        let neighbors = if let Some(cached) = self.vector_cache.get(&key) {
            cached
        } else {
            let search =
                self.storage
                    .vector_search(VectorTable::Content, &preference.vector, k, &filter);
            match tokio::time::timeout(remaining, search).await {
                Ok(Ok(results)) => {
                    self.vector_cache.put(key, results.clone());
                    results
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "vector search failed; degrading to cold start");
                    return None;
                }
                Err(_) => {
                    warn!("vector search missed the deadline; degrading to cold start");
                    return None;
                }
            }
        };

        let ranked = strategies::similar_content(pool, &neighbors);
        let threshold = self.config.rec_similarity_threshold;
        let ranked: Vec<ScoredCandidate> = ranked
            .into_iter()
            .filter(|c| c.score >= threshold)
            .collect();
        if ranked.is_empty() {
            return None;
        }
        Some(ranked)
    }
}

/// Convenience: is this audience subject to safety filtering at all.
#[must_use]
pub fn audience_is_restricted(audience: Audience) -> bool {
    !safety::excluded_genres(audience).is_empty()
}
