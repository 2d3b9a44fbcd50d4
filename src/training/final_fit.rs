//! Refit of the selected configuration on the whole training partition

use crate::core::{Dataset, Result};
use crate::data::Partition;
use crate::network::{build, Network};
use crate::search::TrialConfig;
use crate::training::trial_loop::{EpochRecord, TrainingLoop};
use log::info;

/// Train a fresh network for `config.epochs()` epochs without validation
///
/// `train` is the full training partition (sub-train and validation
/// together). Weight initialisation and batch order both derive from `seed`.
pub fn train_final(
    config: &TrialConfig,
    train: &Partition,
    seed: u64,
) -> Result<(Network, Vec<EpochRecord>)> {
    let network = build(config, train.dim(), train.n_classes(), seed)?;
    let (network, history) = TrainingLoop::new(network, train, config, seed)?.fit()?;
    if let Some(last) = history.last() {
        info!(
            "Final model trained on {} records for {} epochs, last loss {:.5}",
            train.len(),
            history.len(),
            last.train_loss
        );
    }
    Ok((network, history))
}
