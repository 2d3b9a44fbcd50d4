//! Utility functions for preprocessing and dataset diagnostics

pub mod scaling;

use crate::core::Dataset;

/// Validation and diagnostic utilities
pub mod validation {
    use super::*;

    /// Per-class counts and the share of the largest class
    pub fn check_label_balance<D: Dataset>(dataset: &D) -> (Vec<usize>, f64) {
        let counts = dataset.class_counts();
        let total: usize = counts.iter().sum();
        let majority = counts.iter().copied().max().unwrap_or(0);
        let share = if total == 0 {
            0.0
        } else {
            majority as f64 / total as f64
        };
        (counts, share)
    }

    /// Accuracy of always predicting the most frequent class
    pub fn majority_baseline<D: Dataset>(dataset: &D) -> f64 {
        check_label_balance(dataset).1
    }

    /// Fail if any feature value is NaN or infinite
    pub fn validate_finite_features<D: Dataset>(dataset: &D) -> Result<(), String> {
        for i in 0..dataset.len() {
            let sample = dataset.get_sample(i);
            if let Some(j) = sample.features.iter().position(|v| !v.is_finite()) {
                return Err(format!(
                    "Non-finite value in feature {j} of record {}",
                    sample.id
                ));
            }
        }
        Ok(())
    }
}

/// Statistical utilities for datasets
pub mod stats {
    use super::*;
    use serde::{Deserialize, Serialize};

    /// Mean, population standard deviation and range of one feature column
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct ColumnStats {
        pub mean: f64,
        pub std: f64,
        pub min: f64,
        pub max: f64,
    }

    /// Column-wise statistics over every sample of a dataset
    pub fn column_stats<D: Dataset>(dataset: &D) -> Vec<ColumnStats> {
        let n = dataset.len();
        (0..dataset.dim())
            .map(|j| {
                let values = (0..n).map(|i| dataset.get_sample(i).features[j]);
                let (sum, min, max) = values.fold(
                    (0.0, f64::INFINITY, f64::NEG_INFINITY),
                    |(s, lo, hi), v| (s + v, lo.min(v), hi.max(v)),
                );
                let mean = if n == 0 { 0.0 } else { sum / n as f64 };
                let variance = if n == 0 {
                    0.0
                } else {
                    (0..n)
                        .map(|i| (dataset.get_sample(i).features[j] - mean).powi(2))
                        .sum::<f64>()
                        / n as f64
                };
                ColumnStats {
                    mean,
                    std: variance.sqrt(),
                    min,
                    max,
                }
            })
            .collect()
    }
}
