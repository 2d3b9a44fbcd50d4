//! Feature standardisation fit on training data only
//!
//! [`StandardScaler::fit`] accepts nothing but an unscaled train partition,
//! and [`StandardScaler::transform`] refuses data that was already scaled.
//! Both conditions are reported as [`ExperimentError::DataLeakage`].

use crate::core::{Dataset, ExperimentError, PartitionKind, Result};
use crate::data::Partition;
use log::debug;
use serde::Serialize;

/// Features with a standard deviation below this are treated as constant
const CONSTANT_EPSILON: f64 = 1e-12;

/// Per-feature mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Compute scaling parameters from a training partition
    pub fn fit(train: &Partition) -> Result<Self> {
        if train.kind() != PartitionKind::Train {
            return Err(ExperimentError::DataLeakage(format!(
                "scaler may only be fit on train data, got {} partition",
                train.kind()
            )));
        }
        if train.is_scaled() {
            return Err(ExperimentError::DataLeakage(
                "scaler fit requested on already-scaled data".to_string(),
            ));
        }
        if train.is_empty() {
            return Err(ExperimentError::EmptyDataset);
        }

        let n = train.len() as f64;
        let dim = train.dim();
        let mut means = vec![0.0; dim];
        for sample in train.samples() {
            for (m, &v) in means.iter_mut().zip(&sample.features) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; dim];
        for sample in train.samples() {
            for ((s, &v), &m) in stds.iter_mut().zip(&sample.features).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
        }

        debug!("Fitted standard scaler on {} records x {dim} features", train.len());
        Ok(Self { means, stds })
    }

    /// Apply the fitted parameters to any partition of matching width
    pub fn transform(&self, partition: &Partition) -> Result<Partition> {
        if partition.dim() != self.means.len() {
            return Err(ExperimentError::DimensionMismatch {
                expected: self.means.len(),
                actual: partition.dim(),
            });
        }
        if partition.is_scaled() {
            return Err(ExperimentError::DataLeakage(format!(
                "{} partition is already scaled",
                partition.kind()
            )));
        }
        Ok(partition.map_features(|features| self.transform_row(features)))
    }

    fn transform_row(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&v, (&mean, &std))| {
                if std < CONSTANT_EPSILON {
                    0.0
                } else {
                    (v - mean) / std
                }
            })
            .collect()
    }

    /// Fitted means, one per feature
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Fitted standard deviations, one per feature
    pub fn stds(&self) -> &[f64] {
        &self.stds
    }
}
