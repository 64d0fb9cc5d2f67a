//! Reusable skill records consolidated from high-reward episodes.
//!
//! Skills are never consulted by the recommendation pipeline; the
//! optimization cycle may read them as side information.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ReflexionEpisode;

/// A reusable artifact distilled from repeated successful episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    /// Call signature for programmatic reuse.
    pub signature: String,
    /// Free-text body.
    pub code: String,
    pub domain: String,
    pub success_rate: f32,
    pub usage_count: u64,
    pub avg_execution_time_ms: f64,
}

/// Project episodes with reward at or above `min_reward`, grouped by
/// task, into skills. A task needs at least `min_occurrences` qualifying
/// episodes to produce one.
#[must_use]
pub fn consolidate_skills(
    episodes: &[ReflexionEpisode],
    min_reward: f32,
    min_occurrences: usize,
) -> Vec<Skill> {
    let mut by_task: HashMap<&str, Vec<&ReflexionEpisode>> = HashMap::new();
    for episode in episodes {
        if episode.reward >= min_reward {
            by_task.entry(episode.task.as_str()).or_default().push(episode);
        }
    }

    let mut skills: Vec<Skill> = by_task
        .into_iter()
        .filter(|(_, group)| group.len() >= min_occurrences)
        .map(|(task, group)| {
            let successes = group.iter().filter(|e| e.success).count();
            let dominant_action = dominant_action(&group);
            Skill {
                name: format!("skill:{task}"),
                description: format!("Learned approach for '{task}'"),
                signature: format!("apply(task: \"{task}\") -> ranked items"),
                code: dominant_action.to_string(),
                domain: "recommendation".to_string(),
                success_rate: successes as f32 / group.len() as f32,
                usage_count: group.len() as u64,
                avg_execution_time_ms: 0.0,
            }
        })
        .collect();
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills
}

fn dominant_action<'a>(group: &[&'a ReflexionEpisode]) -> &'a str {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for episode in group {
        *counts.entry(episode.action.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(action, count)| (*count, std::cmp::Reverse(*action)))
        .map_or("", |(action, _)| action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn episode(task: &str, action: &str, reward: f32, success: bool) -> ReflexionEpisode {
        ReflexionEpisode {
            id: 0,
            session_id: "s".into(),
            task: task.into(),
            action: action.into(),
            reward,
            success,
            critique: String::new(),
            learnings: vec![],
            embedding: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn consolidation_requires_repetition() {
        let episodes = vec![
            episode("pick evening series", "binge_optimized", 0.9, true),
            episode("pick evening series", "binge_optimized", 0.8, true),
            episode("one-off task", "content_based", 0.95, true),
        ];
        let skills = consolidate_skills(&episodes, 0.7, 2);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "skill:pick evening series");
        assert_eq!(skills[0].code, "binge_optimized");
        assert!((skills[0].success_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn low_reward_episodes_do_not_consolidate() {
        let episodes = vec![
            episode("t", "a", 0.1, false),
            episode("t", "a", 0.2, false),
            episode("t", "a", 0.3, false),
        ];
        assert!(consolidate_skills(&episodes, 0.7, 2).is_empty());
    }
}
