//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a record: its row position in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub usize);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Labelled observation with dense, already-encoded features
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Source row identity, preserved across splits and scaling
    pub id: RecordId,
    /// Feature vector
    pub features: Vec<f64>,
    /// Class index in `0..n_classes`
    pub label: usize,
}

impl Sample {
    /// Create a new sample
    pub fn new(id: RecordId, features: Vec<f64>, label: usize) -> Self {
        Self {
            id,
            features,
            label,
        }
    }

    /// Number of features
    pub fn dim(&self) -> usize {
        self.features.len()
    }
}

/// Prediction result containing the winning class and its softmax probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted class index (argmax of the logits, lowest index on ties)
    pub label: usize,
    /// Softmax probability of the predicted class
    pub probability: f64,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: usize, probability: f64) -> Self {
        Self { label, probability }
    }

    /// Build a prediction from raw logits
    pub fn from_logits(logits: &[f64]) -> Self {
        let label = argmax(logits);
        let probs = softmax(logits);
        Self::new(label, probs.get(label).copied().unwrap_or(0.0))
    }
}

/// Role of a partition within an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionKind {
    /// Raw, not yet split data
    Full,
    Train,
    Validation,
    Test,
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartitionKind::Full => "full",
            PartitionKind::Train => "train",
            PartitionKind::Validation => "validation",
            PartitionKind::Test => "test",
        };
        f.write_str(name)
    }
}

/// Index of the largest value; the first one wins on ties
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Numerically stable softmax
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f64> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
