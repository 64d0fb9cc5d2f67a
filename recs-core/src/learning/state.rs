//! State and action vocabulary for the Q-table.
//!
//! The state string is a lossy canonical summary:
//! `"<sorted-top-2-genres>|mood:<m>|seg:<s>|type:<t>"`. The collapse is
//! intentional; enriching it opportunistically destabilizes the Q-table
//! between versions. A schema change requires a versioned prefix
//! (`"v2|..."`) with legacy entries treated as a separate action space.

use serde::{Deserialize, Serialize};

use crate::types::{ContentFilter, UserSegment};

/// The fixed 10-strategy action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ContentBased,
    Collaborative,
    GenreWeighted,
    RecencyBoosted,
    PopularityBoosted,
    DiversityEnhanced,
    MoodMatched,
    BingeOptimized,
    DiscoveryMode,
    TrendingFocus,
}

impl Action {
    /// Every action, in vocabulary order.
    pub const ALL: [Action; 10] = [
        Action::ContentBased,
        Action::Collaborative,
        Action::GenreWeighted,
        Action::RecencyBoosted,
        Action::PopularityBoosted,
        Action::DiversityEnhanced,
        Action::MoodMatched,
        Action::BingeOptimized,
        Action::DiscoveryMode,
        Action::TrendingFocus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ContentBased => "content_based",
            Action::Collaborative => "collaborative",
            Action::GenreWeighted => "genre_weighted",
            Action::RecencyBoosted => "recency_boosted",
            Action::PopularityBoosted => "popularity_boosted",
            Action::DiversityEnhanced => "diversity_enhanced",
            Action::MoodMatched => "mood_matched",
            Action::BingeOptimized => "binge_optimized",
            Action::DiscoveryMode => "discovery_mode",
            Action::TrendingFocus => "trending_focus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Action::ALL.into_iter().find(|a| a.as_str() == s)
    }

    /// Stable index into the vocabulary.
    pub fn index(self) -> usize {
        Action::ALL
            .iter()
            .position(|a| *a == self)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the canonical state key from request context.
///
/// The top two genres are sorted lexicographically before joining so
/// equivalent contexts collapse to one state.
#[must_use]
pub fn state_key(
    genres: &[String],
    mood: Option<&str>,
    segment: UserSegment,
    content_type: ContentFilter,
) -> String {
    let mut top: Vec<&str> = genres.iter().take(2).map(String::as_str).collect();
    top.sort_unstable();
    let type_str = match content_type {
        ContentFilter::Series => "series",
        ContentFilter::Movie => "movie",
        ContentFilter::All => "all",
    };
    format!(
        "{}|mood:{}|seg:{}|type:{}",
        top.join(","),
        mood.unwrap_or("neutral"),
        segment.as_str(),
        type_str,
    )
}
