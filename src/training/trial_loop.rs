//! Epoch-level training state machine
//!
//! ```text
//! Training(e) -> Validating(e) -> report -> Training(e+1)
//!                                        |  Pruned(e)
//!                                        |  Completed(accuracy)
//! ```
//!
//! [`TrainingLoop::fit`] runs the training phase alone for final models.

use crate::core::{Dataset, ExperimentError, PartitionKind, Result, Sample, Trainable};
use crate::data::Partition;
use crate::search::{PruneDecision, Trial, TrialConfig};
use crate::training::batch::BatchPlan;
use crate::training::evaluate::evaluate;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Current position of the loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopState {
    Training(usize),
    Validating(usize),
    Pruned(usize),
    Completed(f64),
}

/// Per-epoch training summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    /// Mean of the batch losses of the epoch
    pub train_loss: f64,
    /// `None` when the epoch had no validation phase
    pub validation_accuracy: Option<f64>,
}

/// Drives one model through its epochs on a training partition
pub struct TrainingLoop<'a, M: Trainable> {
    model: M,
    train: &'a Partition,
    batch_size: usize,
    epochs: usize,
    rng: StdRng,
    state: LoopState,
    history: Vec<EpochRecord>,
}

impl<'a, M: Trainable> TrainingLoop<'a, M> {
    pub fn new(model: M, train: &'a Partition, config: &TrialConfig, seed: u64) -> Result<Self> {
        if train.kind() != PartitionKind::Train {
            return Err(ExperimentError::DataLeakage(format!(
                "model parameters may only be fit on train data, got {} partition",
                train.kind()
            )));
        }
        if train.is_empty() {
            return Err(ExperimentError::EmptyDataset);
        }
        if train.dim() != model.n_inputs() {
            return Err(ExperimentError::DimensionMismatch {
                expected: model.n_inputs(),
                actual: train.dim(),
            });
        }

        Ok(Self {
            model,
            train,
            batch_size: config.batch_size(),
            epochs: config.epochs(),
            rng: StdRng::seed_from_u64(seed),
            state: LoopState::Training(0),
            history: Vec::with_capacity(config.epochs()),
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn history(&self) -> &[EpochRecord] {
        &self.history
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// `Training(e) -> Validating(e)`: one pass over a fresh batch plan
    pub fn train_epoch(&mut self) -> Result<f64> {
        let epoch = match self.state {
            LoopState::Training(epoch) => epoch,
            other => {
                return Err(ExperimentError::InvalidParameter(format!(
                    "train_epoch called in state {other:?}"
                )))
            }
        };

        let samples = self.train.samples();
        let plan = BatchPlan::new(samples.len(), self.batch_size, &mut self.rng);
        let mut total = 0.0;

        for (b, batch_indices) in plan.batches().enumerate() {
            let batch: Vec<&Sample> = batch_indices.iter().map(|&i| &samples[i]).collect();
            let labels: Vec<usize> = batch.iter().map(|s| s.label).collect();

            let logits = self.model.forward(&batch, &mut self.rng)?;
            let loss = self.model.compute_loss(&logits, &labels)?;
            if !loss.is_finite() {
                return Err(ExperimentError::NumericalInstability(format!(
                    "loss is {loss} at epoch {epoch}, batch {b}"
                )));
            }
            self.model.step()?;
            if !self.model.is_finite() {
                return Err(ExperimentError::NumericalInstability(format!(
                    "non-finite weights after epoch {epoch}, batch {b}"
                )));
            }
            total += loss;
        }

        let mean_loss = total / plan.n_batches() as f64;
        trace!("Epoch {epoch}: train loss {mean_loss:.5}");
        self.history.push(EpochRecord {
            epoch,
            train_loss: mean_loss,
            validation_accuracy: None,
        });
        self.state = LoopState::Validating(epoch);
        Ok(mean_loss)
    }

    /// `Validating(e) -> report -> Training(e+1) | Pruned(e) | Completed`
    pub fn validate(&mut self, validation: &Partition, trial: &mut Trial<'_>) -> Result<LoopState> {
        let epoch = match self.state {
            LoopState::Validating(epoch) => epoch,
            other => {
                return Err(ExperimentError::InvalidParameter(format!(
                    "validate called in state {other:?}"
                )))
            }
        };
        if validation.kind() == PartitionKind::Test {
            return Err(ExperimentError::DataLeakage(
                "test partition used for validation during search".to_string(),
            ));
        }

        let accuracy = evaluate(&self.model, validation)?;
        if let Some(record) = self.history.last_mut() {
            record.validation_accuracy = Some(accuracy);
        }

        self.state = match trial.report(epoch, accuracy)? {
            PruneDecision::Prune => LoopState::Pruned(epoch),
            PruneDecision::Continue if epoch + 1 >= self.epochs => LoopState::Completed(accuracy),
            PruneDecision::Continue => LoopState::Training(epoch + 1),
        };
        Ok(self.state)
    }

    /// Run every epoch with validation and pruning
    ///
    /// Returns the last validation accuracy, or [`ExperimentError::TrialPruned`].
    pub fn run_trial(mut self, validation: &Partition, trial: &mut Trial<'_>) -> Result<f64> {
        loop {
            self.train_epoch()?;
            match self.validate(validation, trial)? {
                LoopState::Training(_) | LoopState::Validating(_) => continue,
                LoopState::Completed(accuracy) => {
                    debug!("Trial {} completed with accuracy {accuracy:.4}", trial.id());
                    return Ok(accuracy);
                }
                LoopState::Pruned(epoch) => {
                    return Err(ExperimentError::TrialPruned {
                        trial: trial.id(),
                        epoch,
                    })
                }
            }
        }
    }

    /// Run the training phase only for every epoch
    pub fn fit(mut self) -> Result<(M, Vec<EpochRecord>)> {
        for epoch in 0..self.epochs {
            self.train_epoch()?;
            self.state = if epoch + 1 < self.epochs {
                LoopState::Training(epoch + 1)
            } else {
                LoopState::Completed(f64::NAN)
            };
        }
        Ok((self.model, self.history))
    }
}
