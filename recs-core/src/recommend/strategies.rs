//! Pure strategy scoring over a candidate pool.
//!
//! Each scorer returns candidates ranked best-first with a base score;
//! ties break by id so rankings stay deterministic. Strategies that
//! need the store (similar-content neighbors) receive their similarity
//! scores from the engine and only rank here.

use std::collections::HashMap;

use crate::config::ColdStartStrategy;
use crate::types::{Content, ContentKind, TimeOfDay, UserPreference};

/// A candidate with its base strategy score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub content: Content,
    pub score: f32,
}

fn sort_ranked(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.content.id.cmp(&b.content.id))
    });
}

/// Cold start, optionally pre-filtered by requested genres.
///
/// Rating-sorted orders by catalog rating (null counts as 0); recent
/// orders by first-aired date; trending approximates engagement with
/// rating boosted by recency.
#[must_use]
pub fn cold_start(
    pool: &[Content],
    requested_genres: Option<&[String]>,
    strategy: ColdStartStrategy,
) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = pool
        .iter()
        .filter(|c| match requested_genres {
            Some(genres) if !genres.is_empty() => {
                c.genres.iter().any(|g| genres.contains(g))
            }
            _ => true,
        })
        .map(|c| ScoredCandidate {
            content: c.clone(),
            score: cold_start_score(c, strategy),
        })
        .collect();
    sort_ranked(&mut ranked);
    ranked
}

fn cold_start_score(content: &Content, strategy: ColdStartStrategy) -> f32 {
    match strategy {
        ColdStartStrategy::RatingSorted => content.rating_or_zero() / 10.0,
        ColdStartStrategy::Recent => content
            .first_aired
            .map_or(0.0, |date| {
                let age_days = (chrono::Utc::now().date_naive() - date).num_days().max(0);
                // Newer is better; decays to ~0 over roughly a decade.
                1.0 / (1.0 + age_days as f32 / 365.0)
            }),
        ColdStartStrategy::Trending => {
            let recency = content.first_aired.map_or(0.0, |date| {
                let age_days = (chrono::Utc::now().date_naive() - date).num_days().max(0);
                1.0 / (1.0 + age_days as f32 / 90.0)
            });
            0.7 * content.rating_or_zero() / 10.0 + 0.3 * recency
        }
    }
}

/// Genre match: overlap with the user's top genres, weighted by the
/// preference weight of each matched genre and normalized by the
/// top-genre count. Items matching two heavy genres outrank items
/// matching one, which plain set overlap cannot express.
#[must_use]
pub fn genre_match(
    pool: &[Content],
    genre_weights: &HashMap<String, f32>,
    top_genres: &[String],
) -> Vec<ScoredCandidate> {
    let divisor = top_genres.len().max(1) as f32;
    let mut ranked: Vec<ScoredCandidate> = pool
        .iter()
        .map(|c| {
            let weighted_overlap: f32 = c
                .genres
                .iter()
                .filter(|g| top_genres.contains(g))
                .map(|g| genre_weights.get(g).copied().unwrap_or(1.0))
                .sum();
            ScoredCandidate {
                content: c.clone(),
                score: weighted_overlap / divisor,
            }
        })
        .collect();
    sort_ranked(&mut ranked);
    ranked
}

/// Similar content: rank pool members by `1 - cosine_distance` from the
/// ANN results. Pool members absent from the neighbor list drop out.
#[must_use]
pub fn similar_content(
    pool: &[Content],
    neighbors: &[(String, f32)],
) -> Vec<ScoredCandidate> {
    let similarity: HashMap<&str, f32> = neighbors
        .iter()
        .map(|(id, distance)| (id.as_str(), 1.0 - distance))
        .collect();
    let mut ranked: Vec<ScoredCandidate> = pool
        .iter()
        .filter_map(|c| {
            similarity.get(c.id.as_str()).map(|score| ScoredCandidate {
                content: c.clone(),
                score: *score,
            })
        })
        .collect();
    sort_ranked(&mut ranked);
    ranked
}

/// Time based: in the evening and at night series are stably
/// partitioned above movies; ordering within each partition follows the
/// given base ranking.
#[must_use]
pub fn time_based(ranked: Vec<ScoredCandidate>, time_of_day: TimeOfDay) -> Vec<ScoredCandidate> {
    if !matches!(time_of_day, TimeOfDay::Evening | TimeOfDay::Night) {
        return ranked;
    }
    let (series, movies): (Vec<ScoredCandidate>, Vec<ScoredCandidate>) = ranked
        .into_iter()
        .partition(|c| c.content.kind == ContentKind::Series);
    series.into_iter().chain(movies).collect()
}

/// Network based: candidates from the user's top-5 networks score their
/// network weight. Returns `None` when nothing in the pool matches, so
/// the caller can fall back to popularity.
#[must_use]
pub fn network_based(pool: &[Content], preference: &UserPreference) -> Option<Vec<ScoredCandidate>> {
    let top_networks = preference.top_networks(5);
    if top_networks.is_empty() {
        return None;
    }
    let mut ranked: Vec<ScoredCandidate> = pool
        .iter()
        .filter_map(|c| {
            let network = c.network_name.as_ref()?;
            if !top_networks.contains(network) {
                return None;
            }
            preference
                .network_weights
                .get(network)
                .map(|weight| ScoredCandidate {
                    content: c.clone(),
                    score: *weight,
                })
        })
        .collect();
    if ranked.is_empty() {
        return None;
    }
    sort_ranked(&mut ranked);
    Some(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn content(id: &str, kind: ContentKind, genres: &[&str], rating: Option<f32>) -> Content {
        Content {
            id: id.to_string(),
            kind,
            title: id.to_string(),
            year: None,
            overview: String::new(),
            genres: genres.iter().map(|g| (*g).to_string()).collect(),
            original_language: None,
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

    #[test]
    fn cold_start_sorts_by_rating_desc() {
        let pool = vec![
            content("b", ContentKind::Movie, &["Comedy"], Some(8.0)),
            content("a", ContentKind::Series, &["Drama"], Some(9.0)),
            content("c", ContentKind::Movie, &["Action"], None),
        ];
        let ranked = cold_start(&pool, None, ColdStartStrategy::RatingSorted);
        let ids: Vec<&str> = ranked.iter().map(|c| c.content.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn cold_start_genre_prefilter() {
        let pool = vec![
            content("a", ContentKind::Series, &["Drama"], Some(9.0)),
            content("b", ContentKind::Movie, &["Comedy"], Some(8.0)),
        ];
        let genres = vec!["Comedy".to_string()];
        let ranked = cold_start(&pool, Some(&genres), ColdStartStrategy::RatingSorted);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].content.id, "b");
    }

    #[test]
    fn cold_start_recent_prefers_new_releases() {
        let mut fresh = content("fresh", ContentKind::Series, &["Drama"], Some(5.0));
        fresh.first_aired = chrono::Utc::now().date_naive().pred_opt();
        let mut old = content("old", ContentKind::Series, &["Drama"], Some(9.5));
        old.first_aired = chrono::NaiveDate::from_ymd_opt(2001, 1, 1);
        let ranked = cold_start(&[fresh, old], None, ColdStartStrategy::Recent);
        assert_eq!(ranked[0].content.id, "fresh");
    }

    #[test]
    fn genre_match_prefers_multi_genre_overlap() {
        let pool = vec![
            content("both", ContentKind::Series, &["Drama", "Thriller"], None),
            content("half", ContentKind::Series, &["Drama", "Romance"], None),
            content("none", ContentKind::Movie, &["Comedy"], None),
        ];
        let weights = HashMap::from([
            ("Drama".to_string(), 0.9f32),
            ("Thriller".to_string(), 0.7),
        ]);
        let top = vec!["Drama".to_string(), "Thriller".to_string()];
        let ranked = genre_match(&pool, &weights, &top);
        assert_eq!(ranked[0].content.id, "both");
        assert!((ranked[0].score - 0.8).abs() < 1e-6);
        assert_eq!(ranked[1].content.id, "half");
        assert!((ranked[1].score - 0.45).abs() < 1e-6);
        assert!((ranked[2].score - 0.0).abs() < 1e-6);
    }

    #[test]
    fn time_based_partitions_series_in_evening() {
        let ranked = vec![
            ScoredCandidate {
                content: content("movie-hi", ContentKind::Movie, &[], Some(9.0)),
                score: 0.9,
            },
            ScoredCandidate {
                content: content("series-lo", ContentKind::Series, &[], Some(6.0)),
                score: 0.6,
            },
        ];
        let evening = time_based(ranked.clone(), TimeOfDay::Evening);
        assert_eq!(evening[0].content.id, "series-lo");
        let morning = time_based(ranked, TimeOfDay::Morning);
        assert_eq!(morning[0].content.id, "movie-hi");
    }

    #[test]
    fn network_based_requires_a_match() {
        let mut preference = UserPreference::cold_start(Uuid::new_v4());
        preference.network_weights.insert("HBO".into(), 0.9);

        let mut on_hbo = content("a", ContentKind::Series, &[], None);
        on_hbo.network_name = Some("HBO".into());
        let off_network = content("b", ContentKind::Series, &[], None);

        let ranked = network_based(&[on_hbo, off_network.clone()], &preference).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].content.id, "a");
        assert!((ranked[0].score - 0.9).abs() < 1e-6);

        assert!(network_based(&[off_network], &preference).is_none());
    }

    #[test]
    fn similar_content_ranks_by_similarity() {
        let pool = vec![
            content("x", ContentKind::Series, &[], None),
            content("y", ContentKind::Series, &[], None),
            content("z", ContentKind::Series, &[], None),
        ];
        let neighbors = vec![("y".to_string(), 0.1), ("x".to_string(), 0.4)];
        let ranked = similar_content(&pool, &neighbors);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].content.id, "y");
        assert!((ranked[0].score - 0.9).abs() < 1e-6);
    }
}
