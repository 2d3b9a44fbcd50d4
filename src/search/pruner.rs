//! Early-stopping policies consulted after every reported epoch

use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::search::study::TrialStatus;

/// Pruner verdict for one intermediate report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneDecision {
    Continue,
    Prune,
}

/// Decides whether a running trial should stop early
pub trait Pruner {
    /// Record `metric` (higher is better) for `trial_id` at `epoch`
    fn report(&mut self, trial_id: usize, epoch: usize, metric: f64) -> PruneDecision;

    /// Notify the pruner that a trial ended
    fn finish(&mut self, trial_id: usize, status: TrialStatus);
}

/// Never prunes
#[derive(Debug, Clone, Copy, Default)]
pub struct NopPruner;

impl Pruner for NopPruner {
    fn report(&mut self, _trial_id: usize, _epoch: usize, _metric: f64) -> PruneDecision {
        PruneDecision::Continue
    }

    fn finish(&mut self, _trial_id: usize, _status: TrialStatus) {}
}

/// Prunes a trial whose metric falls strictly below the median of completed
/// trials at the same epoch
///
/// Inactive until `n_startup_trials` trials have completed, and for the
/// first `n_warmup_epochs` epochs of every trial.
#[derive(Debug, Clone)]
pub struct MedianPruner {
    n_startup_trials: usize,
    n_warmup_epochs: usize,
    running: HashMap<usize, Vec<f64>>,
    completed: Vec<Vec<f64>>,
}

impl MedianPruner {
    pub fn new(n_startup_trials: usize, n_warmup_epochs: usize) -> Self {
        Self {
            n_startup_trials,
            n_warmup_epochs,
            running: HashMap::new(),
            completed: Vec::new(),
        }
    }

    fn median_at(&self, epoch: usize) -> Option<f64> {
        let mut values: Vec<f64> = self
            .completed
            .iter()
            .filter_map(|curve| curve.get(epoch).copied())
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        Some(if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        })
    }
}

impl Default for MedianPruner {
    fn default() -> Self {
        Self::new(5, 5)
    }
}

impl Pruner for MedianPruner {
    fn report(&mut self, trial_id: usize, epoch: usize, metric: f64) -> PruneDecision {
        let curve = self.running.entry(trial_id).or_default();
        if curve.len() <= epoch {
            curve.resize(epoch + 1, f64::NAN);
        }
        curve[epoch] = metric;

        if self.completed.len() < self.n_startup_trials || epoch < self.n_warmup_epochs {
            return PruneDecision::Continue;
        }
        match self.median_at(epoch) {
            Some(median) if metric < median => {
                trace!("Trial {trial_id} epoch {epoch}: {metric:.4} below median {median:.4}");
                PruneDecision::Prune
            }
            _ => PruneDecision::Continue,
        }
    }

    fn finish(&mut self, trial_id: usize, status: TrialStatus) {
        if let Some(curve) = self.running.remove(&trial_id) {
            if status == TrialStatus::Completed {
                self.completed.push(curve);
            }
        }
    }
}

/// Serializable choice of pruning policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PrunerConfig {
    None,
    Median {
        n_startup_trials: usize,
        n_warmup_epochs: usize,
    },
}

impl Default for PrunerConfig {
    fn default() -> Self {
        PrunerConfig::Median {
            n_startup_trials: 5,
            n_warmup_epochs: 5,
        }
    }
}

impl PrunerConfig {
    pub fn build(&self) -> Box<dyn Pruner> {
        match *self {
            PrunerConfig::None => Box::new(NopPruner),
            PrunerConfig::Median {
                n_startup_trials,
                n_warmup_epochs,
            } => Box::new(MedianPruner::new(n_startup_trials, n_warmup_epochs)),
        }
    }
}
