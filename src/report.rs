//! Experiment report: JSON persistence and a plain-text summary
//!
//! Reports are written as pretty JSON so a finished search can be inspected
//! or reloaded by the CLI's `report` subcommand.

use crate::api::ExperimentConfig;
use crate::core::{Dataset, ExperimentError, Result};
use crate::data::{CategoricalColumn, EncodedDataset};
use crate::search::{StudySummary, TrialRecord};
use crate::training::{EpochRecord, EvaluationMetrics, FeatureImportance};
use crate::utils::stats::{column_stats, ColumnStats};
use crate::utils::validation::majority_baseline;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Shape and label distribution of the encoded input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_records: usize,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    pub categorical: Vec<CategoricalColumn>,
    pub class_counts: Vec<usize>,
    /// Accuracy of always predicting the most frequent class
    pub majority_baseline: f64,
    /// Raw (unscaled) statistics per encoded feature
    pub feature_stats: Vec<ColumnStats>,
}

impl DatasetSummary {
    pub fn from_dataset(dataset: &EncodedDataset) -> Self {
        Self {
            n_records: dataset.len(),
            n_features: dataset.dim(),
            feature_names: dataset.feature_names().to_vec(),
            categorical: dataset.categorical_columns().to_vec(),
            class_counts: dataset.class_counts(),
            majority_baseline: majority_baseline(dataset),
            feature_stats: column_stats(dataset),
        }
    }

    /// Write a human-readable description
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "Records:  {}", self.n_records)?;
        writeln!(out, "Features: {}", self.n_features)?;
        let counts: Vec<String> = self
            .class_counts
            .iter()
            .enumerate()
            .map(|(c, n)| format!("{c}: {n}"))
            .collect();
        writeln!(out, "Classes:  {}", counts.join(", "))?;
        writeln!(
            out,
            "Majority baseline: {:.2}%",
            self.majority_baseline * 100.0
        )?;
        for column in &self.categorical {
            writeln!(
                out,
                "  {} (reference {}): {}",
                column.name,
                column.dropped,
                column.indicators.join(", ")
            )?;
        }
        writeln!(out, "Encoded features: {}", self.feature_names.join(", "))?;
        for (name, stats) in self.feature_names.iter().zip(&self.feature_stats) {
            writeln!(
                out,
                "  {name:<24} mean {:>9.3}  std {:>9.3}  range [{:.3}, {:.3}]",
                stats.mean, stats.std, stats.min, stats.max
            )?;
        }
        Ok(())
    }
}

/// Everything a finished experiment produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub library_version: String,
    /// RFC 3339 timestamp
    pub created_at: String,
    pub config: ExperimentConfig,
    pub dataset: DatasetSummary,
    pub n_train: usize,
    pub n_test: usize,
    pub test_class_counts: Vec<usize>,
    pub summary: StudySummary,
    pub best_trial: TrialRecord,
    pub trials: Vec<TrialRecord>,
    /// Loss curve of the final refit
    pub final_history: Vec<EpochRecord>,
    /// In-sample accuracy on the partition the final model was fit on
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub test_metrics: EvaluationMetrics,
    /// Sorted by decreasing importance
    pub feature_importances: Vec<FeatureImportance>,
}

impl ExperimentReport {
    /// Save report to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(ExperimentError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| ExperimentError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load report from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(ExperimentError::IoError)?;
        let reader = BufReader::new(file);
        let report = serde_json::from_reader(reader)
            .map_err(|e| ExperimentError::SerializationError(e.to_string()))?;
        Ok(report)
    }

    /// Write the text summary printed by the CLI
    pub fn write_summary<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "=== Experiment report ({}) ===", self.created_at)?;
        writeln!(
            out,
            "Dataset: {} records, {} features; train {} / test {}",
            self.dataset.n_records, self.dataset.n_features, self.n_train, self.n_test
        )?;
        writeln!(
            out,
            "Trials: {} finished, {} completed, {} pruned, {} failed",
            self.summary.n_finished,
            self.summary.n_completed,
            self.summary.n_pruned,
            self.summary.n_failed
        )?;
        writeln!(out)?;

        let best = &self.best_trial;
        writeln!(out, "Best trial #{}", best.id)?;
        if let Some(value) = best.value {
            writeln!(out, "  validation accuracy: {:.2}%", value * 100.0)?;
        }
        writeln!(out, "  config: {}", best.config)?;
        writeln!(out)?;

        writeln!(
            out,
            "Training accuracy (in-sample): {:.2}%",
            self.train_accuracy * 100.0
        )?;
        writeln!(out, "Test accuracy:                 {:.2}%", self.test_accuracy * 100.0)?;
        let m = &self.test_metrics;
        writeln!(
            out,
            "Test precision {:.3}, recall {:.3}, F1 {:.3}, specificity {:.3}",
            m.precision(),
            m.recall(),
            m.f1_score(),
            m.specificity()
        )?;
        writeln!(
            out,
            "Confusion: TP={} TN={} FP={} FN={}",
            m.true_positives, m.true_negatives, m.false_positives, m.false_negatives
        )?;

        if !self.feature_importances.is_empty() {
            writeln!(out)?;
            writeln!(out, "Top features (permutation importance on train):")?;
            for fi in self.feature_importances.iter().take(5) {
                writeln!(out, "  {:<24} {:+.4}", fi.feature, fi.importance)?;
            }
        }
        Ok(())
    }

    /// Print the text summary to stdout
    pub fn print_summary(&self) -> Result<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.write_summary(&mut lock)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RecordId, Sample};
    use crate::search::{LayerConfig, OptimizerKind, TrialConfig, TrialStatus};
    use tempfile::NamedTempFile;

    fn dataset() -> EncodedDataset {
        let samples = (0..10)
            .map(|i| Sample::new(RecordId(i), vec![i as f64, 1.0], usize::from(i < 3)))
            .collect();
        EncodedDataset::from_samples(vec!["Age".into(), "Sex_M".into()], samples).unwrap()
    }

    fn report() -> ExperimentReport {
        let config =
            TrialConfig::new(vec![LayerConfig::new(8, 0.28)], 0.009, 10, 30, OptimizerKind::Adam)
                .unwrap();
        let trial = TrialRecord {
            id: 0,
            config,
            status: TrialStatus::Completed,
            value: Some(0.8),
            intermediate: vec![0.6, 0.8],
            duration_secs: 0.01,
        };
        ExperimentReport {
            library_version: crate::VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            config: ExperimentConfig::default(),
            dataset: DatasetSummary::from_dataset(&dataset()),
            n_train: 8,
            n_test: 2,
            test_class_counts: vec![1, 1],
            summary: StudySummary {
                n_finished: 1,
                n_completed: 1,
                n_pruned: 0,
                n_failed: 0,
            },
            best_trial: trial.clone(),
            trials: vec![trial],
            final_history: vec![EpochRecord {
                epoch: 0,
                train_loss: 0.69,
                validation_accuracy: None,
            }],
            train_accuracy: 0.875,
            test_accuracy: 0.5,
            test_metrics: EvaluationMetrics {
                true_positives: 1,
                true_negatives: 0,
                false_positives: 1,
                false_negatives: 0,
            },
            feature_importances: vec![FeatureImportance {
                feature: "Age".into(),
                index: 0,
                importance: 0.25,
            }],
        }
    }

    #[test]
    fn test_dataset_summary() {
        let summary = DatasetSummary::from_dataset(&dataset());
        assert_eq!(summary.n_records, 10);
        assert_eq!(summary.class_counts, vec![7, 3]);
        assert_eq!(summary.majority_baseline, 0.7);
    }

    #[test]
    fn test_save_and_load() {
        let original = report();
        let file = NamedTempFile::new().unwrap();
        original.save_to_file(file.path()).unwrap();
        let loaded = ExperimentReport::load_from_file(file.path()).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(matches!(
            ExperimentReport::load_from_file(file.path()),
            Err(ExperimentError::SerializationError(_))
        ));
        assert!(matches!(
            ExperimentReport::load_from_file("/nonexistent/report.json"),
            Err(ExperimentError::IoError(_))
        ));
    }

    #[test]
    fn test_summary_text() {
        let mut out = Vec::new();
        report().write_summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Best trial #0"));
        assert!(text.contains("Training accuracy (in-sample): 87.50%"));
        assert!(text.contains("Test accuracy:                 50.00%"));
        assert!(text.contains("layers=[8(p=0.280)]"));
        assert!(text.contains("Age"));
    }
}
