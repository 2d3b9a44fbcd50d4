//! Core traits for datasets and trainable models

use crate::core::{Prediction, Result, Sample};
use rand::rngs::StdRng;

/// Dataset abstraction for labelled, encoded samples
pub trait Dataset {
    /// Number of samples in the dataset
    fn len(&self) -> usize;

    /// Number of features (dimensionality)
    fn dim(&self) -> usize;

    /// Number of label classes the dataset was encoded with
    fn n_classes(&self) -> usize;

    /// Get a single sample by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn get_sample(&self, i: usize) -> &Sample;

    /// Get all labels in dataset order
    fn get_labels(&self) -> Vec<usize> {
        (0..self.len()).map(|i| self.get_sample(i).label).collect()
    }

    /// Per-class sample counts, indexed by class
    fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes()];
        for label in self.get_labels() {
            if label < counts.len() {
                counts[label] += 1;
            }
        }
        counts
    }

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-only side of a model: inference with regularisation disabled
pub trait Classifier {
    /// Width of the expected feature vector
    fn n_inputs(&self) -> usize;

    /// Number of output classes
    fn n_classes(&self) -> usize;

    /// Raw class scores for one feature vector
    fn logits(&self, features: &[f64]) -> Result<Vec<f64>>;

    /// Predict a single feature vector
    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        Ok(Prediction::from_logits(&self.logits(features)?))
    }
}

/// Gradient-based optimisation backend
///
/// One update is `forward` → `compute_loss` → `step`. Implementations own
/// their weights and optimiser state.
pub trait Trainable: Classifier {
    /// Training-mode forward pass; caches what `compute_loss` needs
    fn forward(&mut self, batch: &[&Sample], rng: &mut StdRng) -> Result<Vec<Vec<f64>>>;

    /// Mean cross-entropy of the cached pass; accumulates gradients
    fn compute_loss(&mut self, logits: &[Vec<f64>], labels: &[usize]) -> Result<f64>;

    /// Apply accumulated gradients to the owned weights
    fn step(&mut self) -> Result<()>;

    /// Whether every weight is finite
    fn is_finite(&self) -> bool;
}
