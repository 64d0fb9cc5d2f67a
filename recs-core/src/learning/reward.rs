//! Reward shaping: user actions to scalar rewards in [-1, 1].
//!
//! This is the single source of truth for the rubric; recommendation
//! callers and the learning engine both go through [`reward_for`].

use crate::types::UserAction;

/// Compute the reward for a user action.
///
/// Completion-driven actions interpolate linearly inside their band:
/// completion >= 90% maps to [0.9, 1.0], 50-89% to [0.4, 0.7], below 50%
/// to [-0.1, 0.3]. Ratings map as `(r - 5) / 5` clamped. Watch events
/// without a completion figure are treated as fully watched.
#[must_use]
pub fn reward_for(
    action: UserAction,
    completion_percent: Option<f32>,
    rating: Option<f32>,
) -> f32 {
    match action {
        UserAction::Watched | UserAction::Completed => {
            completion_reward(completion_percent.unwrap_or(100.0))
        }
        UserAction::Skipped => -0.25,
        UserAction::Rated => {
            let r = rating.unwrap_or(5.0).clamp(0.0, 10.0);
            ((r - 5.0) / 5.0).clamp(-1.0, 1.0)
        }
        UserAction::AddedWatchlist => 0.5,
        UserAction::Dismissed => -0.2,
        UserAction::Clicked => 0.1,
    }
}

fn completion_reward(completion: f32) -> f32 {
    let completion = completion.clamp(0.0, 100.0);
    if completion >= 90.0 {
        0.9 + 0.1 * (completion - 90.0) / 10.0
    } else if completion >= 50.0 {
        0.4 + 0.3 * (completion - 50.0) / 40.0
    } else {
        -0.1 + 0.4 * completion / 50.0
    }
}

/// Whether a reward counts as a success for pattern statistics.
#[must_use]
pub fn is_success(reward: f32) -> bool {
    reward > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_bands() {
        assert!((reward_for(UserAction::Completed, Some(100.0), None) - 1.0).abs() < 1e-6);
        assert!((reward_for(UserAction::Completed, Some(90.0), None) - 0.9).abs() < 1e-6);
        let mid = reward_for(UserAction::Watched, Some(70.0), None);
        assert!((0.4..=0.7).contains(&mid));
        let low = reward_for(UserAction::Watched, Some(25.0), None);
        assert!((-0.1..=0.3).contains(&low));
        assert!((reward_for(UserAction::Watched, Some(0.0), None) + 0.1).abs() < 1e-6);
    }

    #[test]
    fn rating_maps_through_center() {
        assert!((reward_for(UserAction::Rated, None, Some(5.0))).abs() < 1e-6);
        assert!((reward_for(UserAction::Rated, None, Some(10.0)) - 1.0).abs() < 1e-6);
        assert!((reward_for(UserAction::Rated, None, Some(0.0)) + 1.0).abs() < 1e-6);
        assert!((reward_for(UserAction::Rated, None, Some(9.0)) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn discrete_actions() {
        assert!((reward_for(UserAction::AddedWatchlist, None, None) - 0.5).abs() < 1e-6);
        assert!((reward_for(UserAction::Dismissed, None, None) + 0.2).abs() < 1e-6);
        let skipped = reward_for(UserAction::Skipped, None, None);
        assert!((-0.3..=-0.2).contains(&skipped));
    }

    #[test]
    fn rewards_stay_bounded() {
        for action in [
            UserAction::Watched,
            UserAction::Skipped,
            UserAction::Rated,
            UserAction::AddedWatchlist,
            UserAction::Dismissed,
            UserAction::Clicked,
            UserAction::Completed,
        ] {
            for completion in [None, Some(-10.0), Some(0.0), Some(55.0), Some(150.0)] {
                for rating in [None, Some(-2.0), Some(3.0), Some(12.0)] {
                    let r = reward_for(action, completion, rating);
                    assert!((-1.0..=1.0).contains(&r), "{action:?} gave {r}");
                }
            }
        }
    }
}
