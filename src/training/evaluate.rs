//! Inference-mode evaluation, the one-shot test holder and feature importance

use crate::core::{Classifier, Dataset, ExperimentError, PartitionKind, Result, Sample};
use crate::data::{LeakageGuard, Partition};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Fraction of samples whose argmax logit equals the label
///
/// Ties in the logits go to the lowest class index. Pure: the model is only
/// read and samples are visited in partition order.
pub fn evaluate<C: Classifier + ?Sized>(model: &C, partition: &Partition) -> Result<f64> {
    if partition.is_empty() {
        return Err(ExperimentError::EmptyDataset);
    }
    accuracy(model, partition.samples())
}

fn accuracy<C: Classifier + ?Sized>(model: &C, samples: &[Sample]) -> Result<f64> {
    let mut correct = 0usize;
    for sample in samples {
        if model.predict(&sample.features)?.label == sample.label {
            correct += 1;
        }
    }
    Ok(correct as f64 / samples.len() as f64)
}

/// Confusion-matrix evaluation with class 1 as the positive class
pub fn evaluate_detailed<C: Classifier + ?Sized>(
    model: &C,
    partition: &Partition,
) -> Result<EvaluationMetrics> {
    if partition.is_empty() {
        return Err(ExperimentError::EmptyDataset);
    }

    let mut tp = 0; // True positives
    let mut tn = 0; // True negatives
    let mut fp = 0; // False positives
    let mut fn_ = 0; // False negatives

    for sample in partition.samples() {
        let predicted = model.predict(&sample.features)?.label;
        match (predicted == 1, sample.label == 1) {
            (true, true) => tp += 1,
            (false, false) => tn += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
        }
    }

    Ok(EvaluationMetrics::new(tp, tn, fp, fn_))
}

/// Binary confusion matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationMetrics {
    fn new(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        Self {
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    /// (TP + TN) / total
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }

    /// TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(self.true_negatives, self.true_negatives + self.false_positives)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Owner of the test partition until the single final evaluation
#[derive(Debug)]
pub struct HeldOutTest {
    partition: Partition,
}

impl HeldOutTest {
    pub fn new(partition: Partition) -> Result<Self> {
        if partition.kind() != PartitionKind::Test {
            return Err(ExperimentError::InvalidParameter(format!(
                "held-out wrapper expects a test partition, got {}",
                partition.kind()
            )));
        }
        if partition.is_empty() {
            return Err(ExperimentError::EmptyDataset);
        }
        Ok(Self { partition })
    }

    pub fn len(&self) -> usize {
        self.partition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partition.is_empty()
    }

    pub fn class_counts(&self) -> Vec<usize> {
        self.partition.class_counts()
    }

    /// Guard over the held-out record ids
    pub fn guard(&self) -> LeakageGuard {
        LeakageGuard::new(self.partition.ids())
    }

    /// Score the final model; consumes the held-out set
    pub fn evaluate_once<C: Classifier + ?Sized>(self, model: &C) -> Result<EvaluationMetrics> {
        let metrics = evaluate_detailed(model, &self.partition)?;
        info!(
            "Test evaluation on {} records: accuracy {:.4}",
            metrics.total(),
            metrics.accuracy()
        );
        Ok(metrics)
    }
}

/// Accuracy drop when one feature column is shuffled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub index: usize,
    pub importance: f64,
}

/// Permutation importance over a training partition, sorted descending
///
/// Ties keep feature order. Only train data is accepted so the test set is
/// never consulted.
pub fn permutation_importance<C: Classifier + ?Sized>(
    model: &C,
    train: &Partition,
    feature_names: &[String],
    seed: u64,
) -> Result<Vec<FeatureImportance>> {
    if train.kind() != PartitionKind::Train {
        return Err(ExperimentError::DataLeakage(format!(
            "feature importance must be computed on train data, got {} partition",
            train.kind()
        )));
    }
    if feature_names.len() != train.dim() {
        return Err(ExperimentError::DimensionMismatch {
            expected: train.dim(),
            actual: feature_names.len(),
        });
    }

    let baseline = evaluate(model, train)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shuffled: Vec<Sample> = train.samples().to_vec();
    let mut importances = Vec::with_capacity(train.dim());

    for (index, name) in feature_names.iter().enumerate() {
        let mut column: Vec<f64> = train.samples().iter().map(|s| s.features[index]).collect();
        column.shuffle(&mut rng);
        for (sample, &v) in shuffled.iter_mut().zip(&column) {
            sample.features[index] = v;
        }

        let permuted = accuracy(model, &shuffled)?;
        importances.push(FeatureImportance {
            feature: name.clone(),
            index,
            importance: baseline - permuted,
        });

        for (sample, original) in shuffled.iter_mut().zip(train.samples()) {
            sample.features[index] = original.features[index];
        }
    }

    importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    debug!(
        "Permutation importance over {} features, baseline accuracy {baseline:.4}",
        importances.len()
    );
    Ok(importances)
}
