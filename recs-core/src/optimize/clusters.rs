//! Similarity-pair mining and union-find clustering over content
//! embeddings.

use std::collections::{BTreeSet, HashMap};

use crate::embedding::geometry::cosine_similarity;
use crate::types::Content;

/// A discovered content cluster.
#[derive(Debug, Clone)]
pub struct ContentCluster {
    /// Member content ids, sorted.
    pub member_ids: Vec<String>,
    /// Distinct primary genres of the members, sorted.
    pub genres: Vec<String>,
    /// Mean similarity of the mined pairs inside this cluster.
    pub avg_similarity: f32,
}

impl ContentCluster {
    pub fn size(&self) -> usize {
        self.member_ids.len()
    }
}

/// Disjoint-set forest with union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Mine all unordered pairs with similarity at or above `threshold`
/// (capped at `max_pairs`), union them, and keep components of at least
/// `min_size` members.
#[must_use]
pub fn mine_clusters(
    rows: &[Content],
    threshold: f32,
    max_pairs: usize,
    min_size: usize,
) -> Vec<ContentCluster> {
    let embedded: Vec<(usize, &Content, &Vec<f32>)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.embedding.as_ref().map(|e| (i, c, e)))
        .collect();

    let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
    'mine: for a in 0..embedded.len() {
        for b in (a + 1)..embedded.len() {
            let similarity = cosine_similarity(embedded[a].2, embedded[b].2);
            if similarity >= threshold {
                pairs.push((a, b, similarity));
                if pairs.len() >= max_pairs {
                    break 'mine;
                }
            }
        }
    }

    let mut forest = UnionFind::new(embedded.len());
    for (a, b, _) in &pairs {
        forest.union(*a, *b);
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for index in 0..embedded.len() {
        let root = forest.find(index);
        components.entry(root).or_default().push(index);
    }

    let mut clusters: Vec<ContentCluster> = components
        .into_values()
        .filter(|members| members.len() >= min_size)
        .map(|members| {
            let member_set: BTreeSet<usize> = members.iter().copied().collect();
            let (mut sum, mut count) = (0.0f32, 0usize);
            for (a, b, similarity) in &pairs {
                if member_set.contains(a) && member_set.contains(b) {
                    sum += similarity;
                    count += 1;
                }
            }
            let mut member_ids: Vec<String> = members
                .iter()
                .map(|i| embedded[*i].1.id.clone())
                .collect();
            member_ids.sort();
            let genres: BTreeSet<String> = members
                .iter()
                .filter_map(|i| embedded[*i].1.primary_genre().map(str::to_string))
                .collect();
            ContentCluster {
                member_ids,
                genres: genres.into_iter().collect(),
                avg_similarity: if count == 0 { 0.0 } else { sum / count as f32 },
            }
        })
        .collect();
    clusters.sort_by(|a, b| a.member_ids.cmp(&b.member_ids));
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::geometry::l2_normalize;
    use crate::types::ContentKind;
    use chrono::Utc;

    fn content(id: &str, genre: &str, embedding: Vec<f32>) -> Content {
        Content {
            id: id.to_string(),
            kind: ContentKind::Series,
            title: id.to_string(),
            year: None,
            overview: String::new(),
            genres: vec![genre.to_string()],
            original_language: None,
            original_country: None,
            rating: None,
            network_id: None,
            network_name: None,
            first_aired: None,
            image_url: None,
            thumbnail_url: None,
            embedding: Some(embedding),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn tight_group_forms_one_cluster() {
        let rows = vec![
            content("a", "Drama", l2_normalize(&[1.0, 0.01, 0.0])),
            content("b", "Drama", l2_normalize(&[1.0, 0.02, 0.0])),
            content("c", "Thriller", l2_normalize(&[1.0, 0.03, 0.0])),
            content("lonely", "Comedy", l2_normalize(&[0.0, 1.0, 0.0])),
        ];
        let clusters = mine_clusters(&rows, 0.75, 500, 3);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.size(), 3);
        assert_eq!(cluster.genres, vec!["Drama".to_string(), "Thriller".to_string()]);
        assert!(cluster.avg_similarity > 0.9);
    }

    #[test]
    fn small_components_are_dropped() {
        let rows = vec![
            content("a", "Drama", l2_normalize(&[1.0, 0.0])),
            content("b", "Drama", l2_normalize(&[1.0, 0.01])),
        ];
        assert!(mine_clusters(&rows, 0.75, 500, 3).is_empty());
    }

    #[test]
    fn pair_cap_bounds_the_work() {
        let rows: Vec<Content> = (0..30)
            .map(|i| content(&format!("c{i}"), "Drama", l2_normalize(&[1.0, 0.001 * i as f32])))
            .collect();
        // With the cap at 1, only the first pair unions.
        let clusters = mine_clusters(&rows, 0.75, 1, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size(), 2);
    }
}
