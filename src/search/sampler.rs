//! Trial configuration proposal strategies

use crate::core::{ExperimentError, Result};
use crate::search::space::{FloatRange, IntRange, LayerConfig, SearchSpace, TrialConfig};
use log::trace;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Proposes a configuration for each new trial
pub trait Sampler {
    fn propose(&mut self, trial_id: usize, space: &SearchSpace) -> Result<TrialConfig>;
}

/// Independent uniform (or log-uniform) sampling of every dimension
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn propose(&mut self, trial_id: usize, space: &SearchSpace) -> Result<TrialConfig> {
        space.validate()?;
        let rng = &mut self.rng;

        let n_layers = sample_int(space.n_layers, rng);
        let layers = (0..n_layers)
            .map(|_| LayerConfig::new(sample_int(space.units, rng), sample_float(space.dropout, rng)))
            .collect();
        let learning_rate = sample_float(space.learning_rate, rng);
        let batch_size = *choose(&space.batch_size, rng)?;
        let optimizer = *choose(&space.optimizer, rng)?;

        let config = TrialConfig::new(layers, learning_rate, batch_size, space.epochs, optimizer)?;
        trace!("Trial {trial_id} proposed {config}");
        Ok(config)
    }
}

fn choose<'a, T>(choices: &'a [T], rng: &mut StdRng) -> Result<&'a T> {
    choices
        .choose(rng)
        .ok_or_else(|| ExperimentError::InvalidSearchSpace("empty choice list".to_string()))
}

fn sample_int(range: IntRange, rng: &mut StdRng) -> usize {
    if range.low == range.high {
        return range.low;
    }
    if range.log {
        let lo = (range.low as f64).ln();
        let hi = (range.high as f64).ln();
        let v = rng.random_range(lo..=hi).exp().round() as usize;
        v.clamp(range.low, range.high)
    } else {
        rng.random_range(range.low..=range.high)
    }
}

fn sample_float(range: FloatRange, rng: &mut StdRng) -> f64 {
    if range.low == range.high {
        return range.low;
    }
    if range.log {
        let v = rng.random_range(range.low.ln()..=range.high.ln()).exp();
        v.clamp(range.low, range.high)
    } else {
        rng.random_range(range.low..=range.high)
    }
}

/// Replays a fixed list of configurations, one per trial
///
/// Returns [`ExperimentError::SamplerExhausted`] once the list runs out.
#[derive(Debug, Clone, Default)]
pub struct FixedSampler {
    queue: VecDeque<TrialConfig>,
}

impl FixedSampler {
    pub fn new(configs: Vec<TrialConfig>) -> Self {
        Self {
            queue: configs.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl Sampler for FixedSampler {
    fn propose(&mut self, trial_id: usize, _space: &SearchSpace) -> Result<TrialConfig> {
        self.queue
            .pop_front()
            .ok_or(ExperimentError::SamplerExhausted(trial_id))
    }
}
