//! Searchable hyperparameter space and the typed per-trial configuration

use crate::core::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on hidden blocks a configuration may declare
pub const MAX_LAYERS: usize = 8;

/// Update rule used by the training loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Sgd => f.write_str("sgd"),
            OptimizerKind::Adam => f.write_str("adam"),
        }
    }
}

/// Width and dropout probability of one hidden block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub units: usize,
    pub dropout: f64,
}

impl LayerConfig {
    pub fn new(units: usize, dropout: f64) -> Self {
        Self { units, dropout }
    }
}

#[derive(Deserialize)]
struct RawTrialConfig {
    layers: Vec<LayerConfig>,
    learning_rate: f64,
    batch_size: usize,
    epochs: usize,
    optimizer: OptimizerKind,
}

impl TryFrom<RawTrialConfig> for TrialConfig {
    type Error = ExperimentError;

    fn try_from(raw: RawTrialConfig) -> Result<Self> {
        TrialConfig::new(
            raw.layers,
            raw.learning_rate,
            raw.batch_size,
            raw.epochs,
            raw.optimizer,
        )
    }
}

/// Immutable configuration consumed by the model factory and training loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrialConfig")]
pub struct TrialConfig {
    layers: Vec<LayerConfig>,
    learning_rate: f64,
    batch_size: usize,
    epochs: usize,
    optimizer: OptimizerKind,
}

impl TrialConfig {
    /// Validate and build a configuration
    pub fn new(
        layers: Vec<LayerConfig>,
        learning_rate: f64,
        batch_size: usize,
        epochs: usize,
        optimizer: OptimizerKind,
    ) -> Result<Self> {
        if layers.is_empty() || layers.len() > MAX_LAYERS {
            return Err(ExperimentError::InvalidParameter(format!(
                "number of hidden layers must be in 1..={MAX_LAYERS}, got {}",
                layers.len()
            )));
        }
        for (i, layer) in layers.iter().enumerate() {
            if layer.units == 0 {
                return Err(ExperimentError::InvalidParameter(format!(
                    "layer {i} must have at least one unit"
                )));
            }
            if !(0.0..1.0).contains(&layer.dropout) {
                return Err(ExperimentError::InvalidParameter(format!(
                    "layer {i} dropout must be in [0, 1), got {}",
                    layer.dropout
                )));
            }
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(ExperimentError::InvalidParameter(format!(
                "learning rate must be finite and > 0, got {learning_rate}"
            )));
        }
        if batch_size == 0 {
            return Err(ExperimentError::InvalidParameter(
                "batch size must be > 0".to_string(),
            ));
        }
        if epochs == 0 {
            return Err(ExperimentError::InvalidParameter(
                "epochs must be > 0".to_string(),
            ));
        }

        Ok(Self {
            layers,
            learning_rate,
            batch_size,
            epochs,
            optimizer,
        })
    }

    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn optimizer(&self) -> OptimizerKind {
        self.optimizer
    }
}

impl fmt::Display for TrialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layers: Vec<String> = self
            .layers
            .iter()
            .map(|l| format!("{}(p={:.3})", l.units, l.dropout))
            .collect();
        write!(
            f,
            "layers=[{}] lr={:.6} batch={} epochs={} optimizer={}",
            layers.join(", "),
            self.learning_rate,
            self.batch_size,
            self.epochs,
            self.optimizer
        )
    }
}

/// Inclusive integer range, optionally sampled on a log scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntRange {
    pub low: usize,
    pub high: usize,
    #[serde(default)]
    pub log: bool,
}

impl IntRange {
    pub fn new(low: usize, high: usize) -> Self {
        Self {
            low,
            high,
            log: false,
        }
    }

    pub fn log(low: usize, high: usize) -> Self {
        Self {
            low,
            high,
            log: true,
        }
    }
}

/// Inclusive float range, optionally sampled on a log scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub low: f64,
    pub high: f64,
    #[serde(default)]
    pub log: bool,
}

impl FloatRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            log: false,
        }
    }

    pub fn log(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            log: true,
        }
    }
}

/// Declaration of every searchable hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub n_layers: IntRange,
    /// Width of each hidden layer, sampled independently per layer
    pub units: IntRange,
    /// Dropout probability, sampled independently per layer
    pub dropout: FloatRange,
    pub learning_rate: FloatRange,
    pub batch_size: Vec<usize>,
    pub epochs: usize,
    pub optimizer: Vec<OptimizerKind>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            n_layers: IntRange::new(1, 3),
            units: IntRange::log(4, 128),
            dropout: FloatRange::new(0.2, 0.5),
            learning_rate: FloatRange::log(1e-5, 1e-1),
            batch_size: vec![10, 16, 32],
            epochs: 30,
            optimizer: vec![OptimizerKind::Adam, OptimizerKind::Sgd],
        }
    }
}

impl SearchSpace {
    pub fn with_n_layers(mut self, low: usize, high: usize) -> Self {
        self.n_layers = IntRange::new(low, high);
        self
    }

    pub fn with_units(mut self, range: IntRange) -> Self {
        self.units = range;
        self
    }

    pub fn with_dropout(mut self, low: f64, high: f64) -> Self {
        self.dropout = FloatRange::new(low, high);
        self
    }

    pub fn with_learning_rate(mut self, range: FloatRange) -> Self {
        self.learning_rate = range;
        self
    }

    pub fn with_batch_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.batch_size = sizes;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_optimizers(mut self, optimizers: Vec<OptimizerKind>) -> Self {
        self.optimizer = optimizers;
        self
    }

    /// Reject malformed ranges before any trial runs
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ExperimentError::InvalidSearchSpace(msg));

        if self.n_layers.low == 0 || self.n_layers.low > self.n_layers.high {
            return invalid(format!(
                "n_layers range {}..={} must be non-empty and start at 1 or more",
                self.n_layers.low, self.n_layers.high
            ));
        }
        if self.n_layers.high > MAX_LAYERS {
            return invalid(format!(
                "n_layers may not exceed {MAX_LAYERS}, got {}",
                self.n_layers.high
            ));
        }
        if self.units.low == 0 || self.units.low > self.units.high {
            return invalid(format!(
                "units range {}..={} must be non-empty and positive",
                self.units.low, self.units.high
            ));
        }
        let d = self.dropout;
        if !(d.low.is_finite() && d.high.is_finite()) || d.low < 0.0 || d.high >= 1.0 || d.low > d.high
        {
            return invalid(format!(
                "dropout range {}..={} must lie within [0, 1)",
                d.low, d.high
            ));
        }
        if d.log && d.low <= 0.0 {
            return invalid("log-scaled dropout range must be positive".to_string());
        }
        let lr = self.learning_rate;
        if !(lr.low.is_finite() && lr.high.is_finite()) || lr.low <= 0.0 || lr.low > lr.high {
            return invalid(format!(
                "learning rate range {}..={} must be positive and non-empty",
                lr.low, lr.high
            ));
        }
        if self.batch_size.is_empty() || self.batch_size.contains(&0) {
            return invalid("batch_size choices must be non-empty and positive".to_string());
        }
        if self.epochs == 0 {
            return invalid("epochs must be > 0".to_string());
        }
        if self.optimizer.is_empty() {
            return invalid("optimizer choices must be non-empty".to_string());
        }
        Ok(())
    }
}
