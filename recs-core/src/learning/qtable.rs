//! Double Q-learning over (state, action) pairs.
//!
//! Two tables are kept; each update randomly picks one to update and
//! bootstraps the target from the other, which removes the maximization
//! bias of plain Q-learning. Q-values are bounded only by the reward
//! stream and the hyperparameters; there is no manual clipping.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::Action;

/// One persisted Q-table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QEntry {
    pub state: String,
    pub action: String,
    pub value: f64,
    pub updates: i64,
}

#[derive(Debug, Default, Clone)]
struct StateRow {
    q1: HashMap<Action, f64>,
    q2: HashMap<Action, f64>,
    updates: HashMap<Action, i64>,
    /// Total visits to this state, for UCB bonuses.
    visits: u64,
}

/// Double Q-table with visit counters.
#[derive(Debug, Default)]
pub struct DoubleQTable {
    rows: HashMap<String, StateRow>,
    pub learning_rate: f64,
    pub discount: f64,
}

impl DoubleQTable {
    #[must_use]
    pub fn new(learning_rate: f64, discount: f64) -> Self {
        Self {
            rows: HashMap::new(),
            learning_rate,
            discount,
        }
    }

    /// Mean of the two estimates for (state, action).
    #[must_use]
    pub fn mean_q(&self, state: &str, action: Action) -> f64 {
        let Some(row) = self.rows.get(state) else {
            return 0.0;
        };
        let q1 = row.q1.get(&action).copied().unwrap_or(0.0);
        let q2 = row.q2.get(&action).copied().unwrap_or(0.0);
        (q1 + q2) / 2.0
    }

    /// Number of times the state has been visited by an update.
    #[must_use]
    pub fn state_visits(&self, state: &str) -> u64 {
        self.rows.get(state).map_or(0, |row| row.visits)
    }

    /// One double-Q update step.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        state: &str,
        action: Action,
        reward: f64,
        next_state: &str,
        done: bool,
        rng: &mut R,
    ) {
        let update_first: bool = rng.gen_bool(0.5);

        // Bootstrap target: argmax by the table being updated, value from
        // the other table.
        let target = if done {
            reward
        } else {
            let next_row = self.rows.get(next_state);
            let best_next = Action::ALL
                .into_iter()
                .max_by(|a, b| {
                    let qa = next_row.map_or(0.0, |r| side(r, update_first).get(a).copied().unwrap_or(0.0));
                    let qb = next_row.map_or(0.0, |r| side(r, update_first).get(b).copied().unwrap_or(0.0));
                    qa.partial_cmp(&qb).unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(Action::ContentBased);
            let other = next_row.map_or(0.0, |r| {
                side(r, !update_first).get(&best_next).copied().unwrap_or(0.0)
            });
            reward + self.discount * other
        };

        let lr = self.learning_rate;
        let row = self.rows.entry(state.to_string()).or_default();
        let table = if update_first { &mut row.q1 } else { &mut row.q2 };
        let q = table.entry(action).or_insert(0.0);
        *q += lr * (target - *q);
        *row.updates.entry(action).or_insert(0) += 1;
        row.visits += 1;
    }

    /// TD error of a hypothetical update, used for replay priorities.
    #[must_use]
    pub fn td_error(&self, state: &str, action: Action, reward: f64, next_state: &str, done: bool) -> f64 {
        let current = self.mean_q(state, action);
        let target = if done {
            reward
        } else {
            let best = Action::ALL
                .into_iter()
                .map(|a| self.mean_q(next_state, a))
                .fold(f64::NEG_INFINITY, f64::max);
            reward + self.discount * if best.is_finite() { best } else { 0.0 }
        };
        target - current
    }

    /// Export every (state, action) with a nonzero update count.
    #[must_use]
    pub fn entries(&self) -> Vec<QEntry> {
        let mut out = Vec::new();
        for (state, row) in &self.rows {
            for (action, updates) in &row.updates {
                out.push(QEntry {
                    state: state.clone(),
                    action: action.as_str().to_string(),
                    value: self.mean_q(state, *action),
                    updates: *updates,
                });
            }
        }
        out.sort_by(|a, b| (&a.state, &a.action).cmp(&(&b.state, &b.action)));
        out
    }

    /// Load persisted entries; both sides start from the stored mean.
    pub fn load(&mut self, entries: Vec<QEntry>) {
        for entry in entries {
            let Some(action) = Action::parse(&entry.action) else {
                continue;
            };
            let row = self.rows.entry(entry.state.clone()).or_default();
            row.q1.insert(action, entry.value);
            row.q2.insert(action, entry.value);
            row.updates.insert(action, entry.updates);
            row.visits += entry.updates.max(0) as u64;
        }
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.rows.len()
    }
}

fn side(row: &StateRow, first: bool) -> &HashMap<Action, f64> {
    if first {
        &row.q1
    } else {
        &row.q2
    }
}
