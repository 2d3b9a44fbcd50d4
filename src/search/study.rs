//! Sequential trial orchestration with an append-only trial log

use crate::core::{ExperimentError, Result};
use crate::search::pruner::{PruneDecision, Pruner};
use crate::search::sampler::Sampler;
use crate::search::space::{SearchSpace, TrialConfig};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Terminal state of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    Completed,
    Pruned,
    /// Ended by numerical instability
    Failed,
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialStatus::Completed => f.write_str("completed"),
            TrialStatus::Pruned => f.write_str("pruned"),
            TrialStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Log entry for one finished trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub id: usize,
    pub config: TrialConfig,
    pub status: TrialStatus,
    /// Final validation accuracy; `Some` only for completed trials
    pub value: Option<f64>,
    /// Validation accuracy per epoch, in epoch order
    pub intermediate: Vec<f64>,
    pub duration_secs: f64,
}

/// Handle given to the objective for one running trial
pub struct Trial<'a> {
    id: usize,
    config: TrialConfig,
    pruner: &'a mut dyn Pruner,
    intermediate: Vec<f64>,
}

impl Trial<'_> {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// Metrics reported so far
    pub fn intermediate(&self) -> &[f64] {
        &self.intermediate
    }

    /// Report the validation metric of `epoch` and ask whether to continue
    ///
    /// Epochs must be reported consecutively starting at 0.
    pub fn report(&mut self, epoch: usize, metric: f64) -> Result<PruneDecision> {
        if epoch != self.intermediate.len() {
            return Err(ExperimentError::InvalidParameter(format!(
                "trial {} expected a report for epoch {}, got {}",
                self.id,
                self.intermediate.len(),
                epoch
            )));
        }
        self.intermediate.push(metric);
        Ok(self.pruner.report(self.id, epoch, metric))
    }
}

/// Aggregate counts over the trial log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StudySummary {
    pub n_finished: usize,
    pub n_completed: usize,
    pub n_pruned: usize,
    pub n_failed: usize,
}

/// Runs trials one after another and keeps their records
pub struct Study {
    space: SearchSpace,
    pruner: Box<dyn Pruner>,
    n_trials: usize,
    timeout: Option<Duration>,
    trials: Vec<TrialRecord>,
}

impl Study {
    pub fn new(space: SearchSpace, pruner: Box<dyn Pruner>) -> Self {
        Self {
            space,
            pruner,
            n_trials: 100,
            timeout: None,
            trials: Vec::new(),
        }
    }

    pub fn with_n_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Run trials until `n_trials` have finished, the timeout has elapsed
    /// before a new trial would start, or the sampler is exhausted
    pub fn optimize<S, F>(&mut self, sampler: &mut S, mut objective: F) -> Result<()>
    where
        S: Sampler + ?Sized,
        F: FnMut(&mut Trial<'_>) -> Result<f64>,
    {
        self.space.validate()?;
        let started = Instant::now();

        for _ in 0..self.n_trials {
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    info!(
                        "Study timeout of {:.1}s reached after {} trials",
                        limit.as_secs_f64(),
                        self.trials.len()
                    );
                    break;
                }
            }

            let id = self.trials.len();
            let config = match sampler.propose(id, &self.space) {
                Ok(config) => config,
                Err(ExperimentError::SamplerExhausted(_)) => {
                    info!("Sampler exhausted after {id} trials");
                    break;
                }
                Err(e) => return Err(e),
            };
            debug!("Trial {id} starting: {config}");

            let trial_started = Instant::now();
            let mut trial = Trial {
                id,
                config: config.clone(),
                pruner: self.pruner.as_mut(),
                intermediate: Vec::new(),
            };
            let outcome = objective(&mut trial);
            let intermediate = trial.intermediate;

            let (status, value) = match outcome {
                Ok(v) if v.is_finite() => (TrialStatus::Completed, Some(v)),
                Ok(v) => {
                    warn!("Trial {id} returned non-finite value {v}; marking failed");
                    (TrialStatus::Failed, None)
                }
                Err(ExperimentError::TrialPruned { epoch, .. }) => {
                    debug!("Trial {id} pruned at epoch {epoch}");
                    (TrialStatus::Pruned, None)
                }
                Err(ExperimentError::NumericalInstability(msg)) => {
                    warn!("Trial {id} failed: {msg}");
                    (TrialStatus::Failed, None)
                }
                Err(e) => return Err(e),
            };
            self.pruner.finish(id, status);

            let record = TrialRecord {
                id,
                config,
                status,
                value,
                intermediate,
                duration_secs: trial_started.elapsed().as_secs_f64(),
            };
            match record.value {
                Some(v) => info!("Trial {id} {status} with value {v:.4}"),
                None => info!("Trial {id} {status}"),
            }
            self.trials.push(record);
        }

        Ok(())
    }

    /// Append-only log of finished trials
    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    /// Completed trial with the highest value; the earliest wins on ties
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        let mut best: Option<(&TrialRecord, f64)> = None;
        for record in &self.trials {
            if let (TrialStatus::Completed, Some(v)) = (record.status, record.value) {
                if best.map_or(true, |(_, b)| v > b) {
                    best = Some((record, v));
                }
            }
        }
        best.map(|(record, _)| record)
    }

    pub fn summary(&self) -> StudySummary {
        let count = |s: TrialStatus| self.trials.iter().filter(|t| t.status == s).count();
        StudySummary {
            n_finished: self.trials.len(),
            n_completed: count(TrialStatus::Completed),
            n_pruned: count(TrialStatus::Pruned),
            n_failed: count(TrialStatus::Failed),
        }
    }
}
