//! Build an untrained network from a trial configuration

use crate::core::{ExperimentError, Result};
use crate::network::layer::Dense;
use crate::network::mlp::{HiddenBlock, Network};
use crate::network::optimizer::Optimizer;
use crate::search::TrialConfig;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Construct a freshly initialised network
///
/// Layer `i` maps `config.layers()[i-1].units` (or `n_inputs` for the first
/// block) to `config.layers()[i].units`; the output layer maps the last
/// hidden width to `n_classes`. Initial weights are a pure function of `seed`.
pub fn build(config: &TrialConfig, n_inputs: usize, n_classes: usize, seed: u64) -> Result<Network> {
    if n_inputs == 0 {
        return Err(ExperimentError::InvalidParameter(
            "network needs at least one input feature".to_string(),
        ));
    }
    if n_classes < 2 {
        return Err(ExperimentError::InvalidParameter(format!(
            "network needs at least 2 output classes, got {n_classes}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut fan_in = n_inputs;
    let hidden: Vec<HiddenBlock> = config
        .layers()
        .iter()
        .map(|layer| {
            let dense = Dense::new(fan_in, layer.units, &mut rng);
            fan_in = layer.units;
            HiddenBlock {
                dense,
                dropout: layer.dropout,
            }
        })
        .collect();
    let output = Dense::new(fan_in, n_classes, &mut rng);
    let optimizer = Optimizer::new(config.optimizer(), config.learning_rate());

    let network = Network::new(hidden, output, optimizer);
    debug!(
        "Built network {:?} with {} parameters ({} optimiser)",
        network.widths(),
        network.n_parameters(),
        config.optimizer()
    );
    Ok(network)
}
