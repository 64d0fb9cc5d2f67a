//! Audience safety filtering.
//!
//! A kid or family audience must never see age-inappropriate items. The
//! pool is pre-filtered before strategy dispatch, and the assembled
//! response is verified again; a violation at assembly fails closed.

use crate::types::{Audience, Content};

/// Genres excluded for a kids audience.
const KIDS_EXCLUDED: [&str; 5] = ["Horror", "Adult", "Crime", "Thriller", "War"];
/// Genres excluded for a family audience.
const FAMILY_EXCLUDED: [&str; 2] = ["Horror", "Adult"];
/// Genres excluded for a teens audience.
const TEENS_EXCLUDED: [&str; 1] = ["Adult"];

/// Default blocklist of mature tokens matched against title/overview
/// for the kids audience.
pub const DEFAULT_MATURE_TOKENS: [&str; 6] =
    ["gore", "slasher", "explicit", "erotic", "massacre", "torture"];

/// Genres excluded for an audience.
#[must_use]
pub fn excluded_genres(audience: Audience) -> &'static [&'static str] {
    match audience {
        Audience::Kids => &KIDS_EXCLUDED,
        Audience::Family => &FAMILY_EXCLUDED,
        Audience::Teens => &TEENS_EXCLUDED,
        Audience::Adults => &[],
    }
}

/// Whether one item is unsafe for the audience.
#[must_use]
pub fn is_excluded(content: &Content, audience: Audience, blocklist: &[String]) -> bool {
    let genres = excluded_genres(audience);
    if content.genres.iter().any(|g| genres.contains(&g.as_str())) {
        return true;
    }
    // Token blocklist applies to the kids audience only.
    if audience == Audience::Kids {
        let haystack = format!(
            "{} {}",
            content.title.to_lowercase(),
            content.overview.to_lowercase()
        );
        if blocklist.iter().any(|token| haystack.contains(token.as_str())) {
            return true;
        }
    }
    false
}

/// Pre-filter a candidate pool for the audience.
#[must_use]
pub fn filter_pool(pool: Vec<Content>, audience: Audience, blocklist: &[String]) -> Vec<Content> {
    pool.into_iter()
        .filter(|c| !is_excluded(c, audience, blocklist))
        .collect()
}

/// Ids of selected items that violate the audience constraint. Checked
/// at response assembly; any hit fails the request closed.
#[must_use]
pub fn find_violations(
    selected: &[Content],
    audience: Audience,
    blocklist: &[String],
) -> Vec<String> {
    selected
        .iter()
        .filter(|c| is_excluded(c, audience, blocklist))
        .map(|c| c.id.clone())
        .collect()
}

/// The default blocklist as owned strings.
#[must_use]
pub fn default_blocklist() -> Vec<String> {
    DEFAULT_MATURE_TOKENS.iter().map(|t| (*t).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentKind;
    use chrono::Utc;

    fn content(id: &str, genres: &[&str], title: &str) -> Content {
        Content {
            id: id.to_string(),
            kind: ContentKind::Movie,
            title: title.to_string(),
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
        }
    }

    #[test]
    fn kids_exclude_thriller_and_horror() {
        let blocklist = default_blocklist();
        assert!(is_excluded(&content("a", &["Horror"], "t"), Audience::Kids, &blocklist));
        assert!(is_excluded(&content("b", &["Thriller"], "t"), Audience::Kids, &blocklist));
        assert!(!is_excluded(&content("c", &["Animation"], "t"), Audience::Kids, &blocklist));
    }

    #[test]
    fn family_and_teens_are_progressively_looser() {
        let blocklist = default_blocklist();
        let thriller = content("a", &["Thriller"], "t");
        assert!(!is_excluded(&thriller, Audience::Family, &blocklist));
        assert!(!is_excluded(&thriller, Audience::Teens, &blocklist));
        let horror = content("b", &["Horror"], "t");
        assert!(is_excluded(&horror, Audience::Family, &blocklist));
        assert!(!is_excluded(&horror, Audience::Teens, &blocklist));
    }

    #[test]
    fn blocklist_matches_title_tokens_for_kids() {
        let blocklist = default_blocklist();
        let sneaky = content("a", &["Comedy"], "Slasher Summer Camp");
        assert!(is_excluded(&sneaky, Audience::Kids, &blocklist));
        assert!(!is_excluded(&sneaky, Audience::Family, &blocklist));
    }

    #[test]
    fn filter_and_violations_agree() {
        let blocklist = default_blocklist();
        let pool = vec![
            content("safe", &["Animation"], "Happy Show"),
            content("unsafe", &["Horror"], "Night Terrors"),
        ];
        let filtered = filter_pool(pool.clone(), Audience::Kids, &blocklist);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "safe");

        let violations = find_violations(&pool, Audience::Kids, &blocklist);
        assert_eq!(violations, vec!["unsafe".to_string()]);
    }
}
