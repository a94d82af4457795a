//! Behavior tracking and next-action prediction.
//!
//! Every module visit is remembered in a short per-user window. A predictor
//! reads that window and guesses where the user goes next, so the provider
//! can warm those reads in the background.

use super::lru::BoundedLru;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Most predictions acted on per request.
pub const MAX_PREDICTIONS: usize = 3;

/// One module visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub module: String,
    pub action: String,
    pub at: i64,
}

/// A guessed next view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub module: String,
    pub action: String,
    /// Share of past transitions that went this way, 0 to 1.
    pub confidence: f64,
}

/// Guesses the next views from recent history.
pub trait ActionPredictor: Send + Sync {
    /// `history` is oldest first and ends with the current visit.
    fn predict(&self, history: &[Visit], current_module: &str) -> Vec<Prediction>;
}

/// Predicts the views that most often followed the current module.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionFrequency;

impl ActionPredictor for TransitionFrequency {
    fn predict(&self, history: &[Visit], current_module: &str) -> Vec<Prediction> {
        let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        let mut total = 0usize;
        for pair in history.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if from.module == current_module && to.module != current_module {
                *counts
                    .entry((to.module.as_str(), to.action.as_str()))
                    .or_default() += 1;
                total += 1;
            }
        }

        let mut ranked: Vec<((&str, &str), usize)> = counts.into_iter().collect();
        // Stable sort keeps name order among ties.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(MAX_PREDICTIONS)
            .map(|((module, action), count)| Prediction {
                module: module.to_string(),
                action: action.to_string(),
                confidence: count as f64 / total as f64,
            })
            .collect()
    }
}

/// Bounded per-user visit windows.
#[derive(Debug)]
pub struct BehaviorTracker {
    window: usize,
    users: Mutex<BoundedLru<String, VecDeque<Visit>>>,
}

impl BehaviorTracker {
    #[must_use]
    pub fn new(window: usize, max_users: usize) -> Self {
        Self {
            window: window.max(1),
            users: Mutex::new(BoundedLru::new(max_users)),
        }
    }

    /// Remember a visit, dropping the oldest beyond the window.
    pub fn record(&self, user_id: &str, module: &str, action: &str) {
        let mut users = self.users.lock();
        let visits = users.get_or_insert_with(user_id.to_string(), VecDeque::new);
        if visits.len() == self.window {
            visits.pop_front();
        }
        visits.push_back(Visit {
            module: module.to_string(),
            action: action.to_string(),
            at: lexhub_core::now_millis(),
        });
    }

    /// Recent visits, oldest first.
    #[must_use]
    pub fn recent(&self, user_id: &str) -> Vec<Visit> {
        self.users
            .lock()
            .get(&user_id.to_string())
            .map(|visits| visits.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(module: &str) -> Visit {
        Visit {
            module: module.to_string(),
            action: "view".to_string(),
            at: 0,
        }
    }

    #[test]
    fn window_keeps_most_recent_visits() {
        let tracker = BehaviorTracker::new(2, 8);
        tracker.record("u1", "a", "view");
        tracker.record("u1", "b", "view");
        tracker.record("u1", "c", "view");
        let modules: Vec<String> = tracker.recent("u1").into_iter().map(|v| v.module).collect();
        assert_eq!(modules, vec!["b", "c"]);
        assert!(tracker.recent("nobody").is_empty());
    }

    #[test]
    fn predicts_most_frequent_followers() {
        let history: Vec<Visit> = ["portal", "docs", "portal", "docs", "portal", "research", "portal"]
            .iter()
            .map(|m| visit(m))
            .collect();
        let predictions = TransitionFrequency.predict(&history, "portal");
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].module, "docs");
        assert!((predictions[0].confidence - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(predictions[1].module, "research");
    }

    #[test]
    fn never_predicts_more_than_three() {
        let mut history = Vec::new();
        for next in ["a", "b", "c", "d", "e"] {
            history.push(visit("home"));
            history.push(visit(next));
        }
        assert_eq!(TransitionFrequency.predict(&history, "home").len(), MAX_PREDICTIONS);
    }

    #[test]
    fn no_history_no_predictions() {
        assert!(TransitionFrequency.predict(&[visit("home")], "home").is_empty());
    }
}
