//! Prioritized experience replay.
//!
//! Bounded buffer sampled proportionally to `(|td_error| + eps)^alpha`,
//! with importance-sampling weights annealed toward 1 over time. When
//! full, the lowest-priority entry is evicted.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    REPLAY_BETA_INITIAL, REPLAY_BETA_STEP, REPLAY_PRIORITY_ALPHA, REPLAY_PRIORITY_EPSILON,
};

use super::state::Action;

/// Side context captured with an experience.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceContext {
    pub user_id: Option<String>,
    pub content_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub mood: Option<String>,
    pub genres: Vec<String>,
}

/// One stored transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayExperience {
    pub state: String,
    pub action: Action,
    pub reward: f32,
    pub next_state: String,
    pub done: bool,
    pub context: ExperienceContext,
    pub priority: f64,
}

/// A sampled batch with importance-sampling weights.
#[derive(Debug, Clone)]
pub struct ReplayBatch {
    /// Buffer indices of the sampled entries, for priority re-scoring.
    pub indices: Vec<usize>,
    pub experiences: Vec<ReplayExperience>,
    /// Normalized weights, max weight is 1.
    pub weights: Vec<f64>,
}

/// Priority from a TD error: `(|td| + eps)^alpha`.
#[must_use]
pub fn priority_for(td_error: f64) -> f64 {
    (td_error.abs() + REPLAY_PRIORITY_EPSILON).powf(REPLAY_PRIORITY_ALPHA)
}

/// Bounded prioritized buffer.
pub struct ReplayBuffer {
    entries: Vec<ReplayExperience>,
    capacity: usize,
    beta: f64,
}

impl ReplayBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            beta: REPLAY_BETA_INITIAL,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current annealed importance-sampling exponent.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Insert an experience, evicting the lowest-priority entry if full.
    pub fn push(&mut self, experience: ReplayExperience) {
        if self.entries.len() >= self.capacity {
            if let Some(lowest) = self
                .entries
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    a.1.priority
                        .partial_cmp(&b.1.priority)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
            {
                self.entries.remove(lowest);
            }
        }
        self.entries.push(experience);
    }

    /// Sample a batch proportional to priority.
    ///
    /// Returns `None` until the buffer holds at least `batch` entries.
    /// Each call anneals beta by one step.
    pub fn sample<R: Rng + ?Sized>(&mut self, batch: usize, rng: &mut R) -> Option<ReplayBatch> {
        if self.entries.len() < batch || batch == 0 {
            return None;
        }
        let total: f64 = self.entries.iter().map(|e| e.priority).sum();
        if total <= 0.0 {
            return None;
        }

        let n = self.entries.len() as f64;
        let mut indices = Vec::with_capacity(batch);
        let mut raw_weights = Vec::with_capacity(batch);
        for _ in 0..batch {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = self.entries.len() - 1;
            for (i, entry) in self.entries.iter().enumerate() {
                if target < entry.priority {
                    chosen = i;
                    break;
                }
                target -= entry.priority;
            }
            let probability = self.entries[chosen].priority / total;
            raw_weights.push((n * probability).powf(-self.beta));
            indices.push(chosen);
        }

        let max_weight = raw_weights.iter().copied().fold(f64::MIN, f64::max);
        let weights = raw_weights
            .into_iter()
            .map(|w| if max_weight > 0.0 { w / max_weight } else { 1.0 })
            .collect();
        let experiences = indices.iter().map(|i| self.entries[*i].clone()).collect();

        self.beta = (self.beta + REPLAY_BETA_STEP).min(1.0);
        Some(ReplayBatch {
            indices,
            experiences,
            weights,
        })
    }

    /// Re-score priorities after a learning pass.
    pub fn update_priorities(&mut self, indices: &[usize], td_errors: &[f64]) {
        for (index, td) in indices.iter().zip(td_errors.iter()) {
            if let Some(entry) = self.entries.get_mut(*index) {
                entry.priority = priority_for(*td);
            }
        }
    }

    /// Most recent `n` entries, for checkpoint persistence.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<ReplayExperience> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].to_vec()
    }

    /// Restore persisted experiences (appended in order).
    pub fn load(&mut self, experiences: Vec<ReplayExperience>) {
        for experience in experiences {
            self.push(experience);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn experience(id: usize, priority: f64) -> ReplayExperience {
        ReplayExperience {
            state: "s".into(),
            action: Action::ContentBased,
            reward: 0.5,
            next_state: "s".into(),
            done: false,
            context: ExperienceContext {
                content_id: format!("c{id}"),
                ..ExperienceContext::default()
            },
            priority,
        }
    }

    #[test]
    fn priority_formula() {
        let p = priority_for(0.99);
        assert!((p - 1.0f64.powf(0.6)).abs() < 1e-9);
        assert!(priority_for(0.0) > 0.0);
    }

    #[test]
    fn eviction_removes_lowest_priority() {
        let mut buffer = ReplayBuffer::new(3);
        buffer.push(experience(0, 0.9));
        buffer.push(experience(1, 0.01));
        buffer.push(experience(2, 0.5));
        buffer.push(experience(3, 0.7));
        assert_eq!(buffer.len(), 3);
        assert!(buffer
            .tail(3)
            .iter()
            .all(|e| e.context.content_id != "c1"));
    }

    #[test]
    fn sampling_prefers_high_priority() {
        let mut buffer = ReplayBuffer::new(100);
        buffer.push(experience(0, 100.0));
        for i in 1..40 {
            buffer.push(experience(i, 0.001));
        }
        let mut rng = StdRng::seed_from_u64(11);
        let batch = buffer.sample(32, &mut rng).unwrap();
        let hot = batch
            .experiences
            .iter()
            .filter(|e| e.context.content_id == "c0")
            .count();
        assert!(hot > 16, "high-priority entry sampled only {hot}/32 times");
        assert!(batch.weights.iter().all(|w| (0.0..=1.0).contains(w)));
    }

    #[test]
    fn beta_anneals_toward_one() {
        let mut buffer = ReplayBuffer::new(64);
        for i in 0..32 {
            buffer.push(experience(i, 1.0));
        }
        let mut rng = StdRng::seed_from_u64(5);
        let before = buffer.beta();
        buffer.sample(32, &mut rng).unwrap();
        assert!((buffer.beta() - before - REPLAY_BETA_STEP).abs() < 1e-12);
    }

    #[test]
    fn sample_returns_none_when_underfilled() {
        let mut buffer = ReplayBuffer::new(64);
        buffer.push(experience(0, 1.0));
        let mut rng = StdRng::seed_from_u64(5);
        assert!(buffer.sample(32, &mut rng).is_none());
    }
}
