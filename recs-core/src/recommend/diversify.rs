//! Greedy max-marginal-relevance re-ranking.

use std::collections::HashSet;

use super::strategies::ScoredCandidate;

/// Genre-set similarity: `|a ∩ b| / max(|a|, |b|, 1)`.
fn genre_similarity(a: &[String], b: &[String]) -> f32 {
    let set: HashSet<&String> = a.iter().collect();
    let overlap = b.iter().filter(|g| set.contains(g)).count();
    overlap as f32 / a.len().max(b.len()).max(1) as f32
}

/// Re-rank candidates greedily, trading base score against genre
/// diversity.
///
/// The top-ranked candidate seeds the selection. Every following slot
/// picks, among the rest, the item maximizing
/// `diversity_factor * (1 - min_sim) + (1 - diversity_factor) * base_score`
/// where `min_sim` is the minimum genre similarity to anything already
/// selected. Deterministic given a stable input ranking.
#[must_use]
pub fn diversify(ranked: Vec<ScoredCandidate>, diversity_factor: f32) -> Vec<ScoredCandidate> {
    if ranked.len() <= 1 || diversity_factor <= 0.0 {
        return ranked;
    }

    let mut remaining = ranked;
    let mut selected = vec![remaining.remove(0)];

    while !remaining.is_empty() {
        let mut best_index = 0;
        let mut best_value = f32::NEG_INFINITY;
        for (index, candidate) in remaining.iter().enumerate() {
            let min_sim = selected
                .iter()
                .map(|s| genre_similarity(&candidate.content.genres, &s.content.genres))
                .fold(f32::INFINITY, f32::min);
            let value =
                diversity_factor * (1.0 - min_sim) + (1.0 - diversity_factor) * candidate.score;
            if value > best_value {
                best_value = value;
                best_index = index;
            }
        }
        selected.push(remaining.remove(best_index));
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, ContentKind};
    use chrono::Utc;

    fn candidate(id: &str, genres: &[&str], score: f32) -> ScoredCandidate {
        ScoredCandidate {
            content: Content {
                id: id.to_string(),
                kind: ContentKind::Series,
                title: id.to_string(),
                year: None,
                overview: String::new(),
                genres: genres.iter().map(|g| (*g).to_string()).collect(),
                original_language: None,
                original_country: None,
                rating: None,
                network_id: None,
                network_name: None,
                first_aired: None,
                image_url: None,
                thumbnail_url: None,
                embedding: None,
                updated_at: Utc::now(),
            },
            score,
        }
    }

    #[test]
    fn keeps_top_candidate_first() {
        let ranked = vec![
            candidate("top", &["Drama"], 0.9),
            candidate("second", &["Drama"], 0.8),
        ];
        let result = diversify(ranked, 0.2);
        assert_eq!(result[0].content.id, "top");
    }

    #[test]
    fn promotes_genre_diversity() {
        // Three near-duplicates of the leader and one fresh genre with a
        // slightly lower base score: diversity should lift the outlier.
        let ranked = vec![
            candidate("drama-1", &["Drama"], 0.90),
            candidate("drama-2", &["Drama"], 0.89),
            candidate("drama-3", &["Drama"], 0.88),
            candidate("comedy", &["Comedy"], 0.80),
        ];
        let result = diversify(ranked, 0.5);
        assert_eq!(result[0].content.id, "drama-1");
        assert_eq!(result[1].content.id, "comedy");
    }

    #[test]
    fn is_deterministic() {
        let ranked = vec![
            candidate("a", &["Drama", "Crime"], 0.9),
            candidate("b", &["Drama"], 0.85),
            candidate("c", &["Comedy"], 0.8),
            candidate("d", &["Action"], 0.7),
        ];
        let first = diversify(ranked.clone(), 0.2);
        let second = diversify(ranked, 0.2);
        let ids =
            |v: &[ScoredCandidate]| v.iter().map(|c| c.content.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn zero_factor_is_identity() {
        let ranked = vec![
            candidate("a", &["Drama"], 0.9),
            candidate("b", &["Drama"], 0.8),
            candidate("c", &["Comedy"], 0.7),
        ];
        let result = diversify(ranked.clone(), 0.0);
        let ids =
            |v: &[ScoredCandidate]| v.iter().map(|c| c.content.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&result), ids(&ranked));
    }
}
