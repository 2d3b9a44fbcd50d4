//! High-level experiment pipeline
//!
//! One call runs the whole protocol: stratified split, scaling fit on train,
//! hyperparameter search with per-trial validation splits, a final refit of
//! the best configuration and exactly one evaluation on the held-out test set.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cardiotune::api::Experiment;
//! use cardiotune::data::EncodedDataset;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = EncodedDataset::from_csv("heart.csv", "HeartDisease")?;
//! let report = Experiment::new()
//!     .with_seed(101)
//!     .with_n_trials(50)
//!     .run(&dataset)?;
//!
//! println!("Test accuracy: {:.2}%", report.test_accuracy * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{Dataset, ExperimentError, Result};
use crate::data::{split, split_validation, EncodedDataset, DEFAULT_LABEL_COLUMN};
use crate::network::build;
use crate::report::{DatasetSummary, ExperimentReport};
use crate::search::{PrunerConfig, RandomSampler, Sampler, SearchSpace, Study};
use crate::training::{
    evaluate, permutation_importance, train_final, HeldOutTest, TrainingLoop,
};
use crate::utils::scaling::StandardScaler;
use crate::utils::validation::{check_label_balance, validate_finite_features};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Share of the majority class above which a warning is logged
const IMBALANCE_WARNING: f64 = 0.8;

/// Experiment settings, loadable from JSON; missing fields take defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub label_column: String,
    pub test_fraction: f64,
    /// Fraction of the training partition held out per trial
    pub validation_fraction: f64,
    pub seed: u64,
    pub n_trials: usize,
    /// Wall-clock limit checked before each trial starts
    pub timeout_secs: Option<f64>,
    pub pruner: PrunerConfig,
    pub space: SearchSpace,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            test_fraction: 0.2,
            validation_fraction: 0.2,
            seed: 101,
            n_trials: 100,
            timeout_secs: None,
            pruner: PrunerConfig::default(),
            space: SearchSpace::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load settings from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(ExperimentError::IoError)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ExperimentError::SerializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, fraction) in [
            ("test_fraction", self.test_fraction),
            ("validation_fraction", self.validation_fraction),
        ] {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(ExperimentError::InvalidParameter(format!(
                    "{name} must be in (0, 1), got {fraction}"
                )));
            }
        }
        self.timeout()?;
        self.space.validate()
    }

    fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout_secs.map(timeout_from_secs).transpose()
    }
}

/// Convert a timeout in seconds, rejecting negative, non-finite and
/// out-of-range values
pub fn timeout_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        ExperimentError::InvalidParameter(format!(
            "timeout must be a non-negative number of seconds, got {secs} ({e})"
        ))
    })
}

/// Experiment runner with builder pattern
#[derive(Debug, Clone, Default)]
pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    /// Create an experiment with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Seed for the test split, the sampler and the final refit
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_n_trials(mut self, n_trials: usize) -> Self {
        self.config.n_trials = n_trials;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout_secs = timeout.map(|d| d.as_secs_f64());
        self
    }

    pub fn with_pruner(mut self, pruner: PrunerConfig) -> Self {
        self.config.pruner = pruner;
        self
    }

    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.config.space = space;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.config.test_fraction = fraction;
        self
    }

    pub fn with_validation_fraction(mut self, fraction: f64) -> Self {
        self.config.validation_fraction = fraction;
        self
    }

    pub fn with_label_column(mut self, label: impl Into<String>) -> Self {
        self.config.label_column = label.into();
        self
    }

    /// Run with a seeded random sampler
    pub fn run(&self, dataset: &EncodedDataset) -> Result<ExperimentReport> {
        let mut sampler = RandomSampler::new(self.config.seed);
        self.run_with_sampler(dataset, &mut sampler)
    }

    /// Run with any sampler, e.g. a [`crate::search::FixedSampler`] holding
    /// a single configuration
    pub fn run_with_sampler<S: Sampler + ?Sized>(
        &self,
        dataset: &EncodedDataset,
        sampler: &mut S,
    ) -> Result<ExperimentReport> {
        let cfg = &self.config;
        cfg.validate()?;
        validate_finite_features(dataset).map_err(ExperimentError::InvalidDataset)?;
        let (_, majority) = check_label_balance(dataset);
        if majority > IMBALANCE_WARNING {
            warn!(
                "Majority class covers {:.1}% of records; accuracy may be misleading",
                majority * 100.0
            );
        }

        // Test partition is drawn once, first
        let (raw_train, raw_test) = split(&dataset.to_partition()?, cfg.test_fraction, cfg.seed)?;
        let scaler = StandardScaler::fit(&raw_train)?;
        let train = scaler.transform(&raw_train)?;
        let test = HeldOutTest::new(scaler.transform(&raw_test)?)?;
        let guard = test.guard();
        guard.check(&train)?;
        info!(
            "Split {} records into {} train / {} test (seed {})",
            dataset.len(),
            train.len(),
            test.len(),
            cfg.seed
        );

        let mut study = Study::new(cfg.space.clone(), cfg.pruner.build())
            .with_n_trials(cfg.n_trials)
            .with_timeout(cfg.timeout()?);
        study.optimize(sampler, |trial| {
            let trial_seed = cfg.seed.wrapping_add(trial.id() as u64 + 1);
            let (sub_train, validation) =
                split_validation(&train, cfg.validation_fraction, trial_seed)?;
            guard.check(&sub_train)?;
            guard.check(&validation)?;

            let config = trial.config().clone();
            let model = build(&config, train.dim(), train.n_classes(), trial_seed)?;
            TrainingLoop::new(model, &sub_train, &config, trial_seed)?.run_trial(&validation, trial)
        })?;

        let summary = study.summary();
        let best = study
            .best_trial()
            .cloned()
            .ok_or(ExperimentError::NoCompletedTrials)?;
        info!(
            "Search finished: {} completed, {} pruned, {} failed; best trial #{}",
            summary.n_completed, summary.n_pruned, summary.n_failed, best.id
        );

        // Every decision is frozen from here on
        let (model, final_history) = train_final(&best.config, &train, cfg.seed)?;
        let train_accuracy = evaluate(&model, &train)?;
        let feature_importances =
            permutation_importance(&model, &train, dataset.feature_names(), cfg.seed)?;

        let n_test = test.len();
        let test_class_counts = test.class_counts();
        let test_metrics = test.evaluate_once(&model)?;

        Ok(ExperimentReport {
            library_version: crate::VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            config: cfg.clone(),
            dataset: DatasetSummary::from_dataset(dataset),
            n_train: train.len(),
            n_test,
            test_class_counts,
            summary,
            best_trial: best,
            trials: study.trials().to_vec(),
            final_history,
            train_accuracy,
            test_accuracy: test_metrics.accuracy(),
            test_metrics,
            feature_importances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RecordId, Sample};
    use crate::search::{FixedSampler, LayerConfig, OptimizerKind, TrialConfig, TrialStatus};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dataset(n: usize) -> EncodedDataset {
        let samples = (0..n)
            .map(|i| {
                let label = i % 2;
                let x = if label == 1 { 2.0 } else { -2.0 };
                let noise = ((i * 37) % 11) as f64 / 11.0 - 0.5;
                Sample::new(RecordId(i), vec![x + noise, 50.0 + noise * 10.0], label)
            })
            .collect();
        EncodedDataset::from_samples(vec!["signal".into(), "noise".into()], samples).unwrap()
    }

    fn small_space() -> SearchSpace {
        SearchSpace::default()
            .with_n_layers(1, 1)
            .with_epochs(5)
            .with_optimizers(vec![OptimizerKind::Adam])
    }

    #[test]
    fn test_default_config() {
        let config = ExperimentConfig::default();
        assert_eq!(config.label_column, "HeartDisease");
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.seed, 101);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_partial() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"seed": 7, "n_trials": 3, "pruner": {{"kind": "none"}}}}"#).unwrap();
        let config = ExperimentConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.n_trials, 3);
        assert_eq!(config.pruner, PrunerConfig::None);
        assert_eq!(config.space, SearchSpace::default());
    }

    #[test]
    fn test_config_rejects_bad_fraction() {
        let exp = Experiment::new().with_test_fraction(1.5);
        assert!(matches!(
            exp.run(&dataset(40)),
            Err(ExperimentError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_builder_overrides() {
        let exp = Experiment::new()
            .with_label_column("target")
            .with_validation_fraction(0.25)
            .with_seed(9);
        assert_eq!(exp.config().label_column, "target");
        assert_eq!(exp.config().validation_fraction, 0.25);
        assert_eq!(exp.config().seed, 9);

        let exp = exp.with_validation_fraction(0.0);
        assert!(matches!(
            exp.run(&dataset(40)),
            Err(ExperimentError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_timeout_out_of_range() {
        assert_eq!(timeout_from_secs(1.5).unwrap(), Duration::from_millis(1500));
        for secs in [1e30, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                timeout_from_secs(secs),
                Err(ExperimentError::InvalidParameter(_))
            ));
        }

        let config = ExperimentConfig {
            timeout_secs: Some(1e30),
            ..ExperimentConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(matches!(
            Experiment::from_config(config).run(&dataset(40)),
            Err(ExperimentError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_run_end_to_end() {
        let report = Experiment::new()
            .with_n_trials(3)
            .with_pruner(PrunerConfig::None)
            .with_space(small_space())
            .run(&dataset(60))
            .unwrap();

        assert_eq!(report.n_train, 48);
        assert_eq!(report.n_test, 12);
        assert_eq!(report.test_class_counts, vec![6, 6]);
        assert_eq!(report.summary.n_finished, 3);
        assert_eq!(report.trials.len(), 3);
        assert_eq!(report.final_history.len(), 5);
        assert_eq!(report.test_metrics.total(), 12);
        assert_eq!(report.feature_importances.len(), 2);
        assert!((0.0..=1.0).contains(&report.test_accuracy));
        let best = report
            .trials
            .iter()
            .filter_map(|t| t.value)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(report.best_trial.value, Some(best));
    }

    #[test]
    fn test_run_is_deterministic() {
        let exp = Experiment::new()
            .with_n_trials(2)
            .with_space(small_space())
            .with_seed(5);
        let a = exp.run(&dataset(40)).unwrap();
        let b = exp.run(&dataset(40)).unwrap();
        assert_eq!(a.best_trial.config, b.best_trial.config);
        assert_eq!(a.final_history, b.final_history);
        assert_eq!(a.test_metrics, b.test_metrics);
    }

    #[test]
    fn test_fixed_sampler_run() {
        let config =
            TrialConfig::new(vec![LayerConfig::new(8, 0.28)], 0.009, 10, 30, OptimizerKind::Adam)
                .unwrap();
        let mut sampler = FixedSampler::new(vec![config.clone()]);
        let report = Experiment::new()
            .run_with_sampler(&dataset(80), &mut sampler)
            .unwrap();

        assert_eq!(report.trials.len(), 1);
        assert_eq!(report.best_trial.status, TrialStatus::Completed);
        assert_eq!(report.best_trial.config, config);
        assert!(report.train_accuracy > 0.9);
    }

    #[test]
    fn test_no_completed_trials() {
        let config =
            TrialConfig::new(vec![LayerConfig::new(4, 0.2)], 0.01, 10, 2, OptimizerKind::Sgd)
                .unwrap();
        let mut sampler = FixedSampler::new(vec![config]);
        let result = Experiment::new()
            .with_n_trials(0)
            .run_with_sampler(&dataset(40), &mut sampler);
        assert!(matches!(result, Err(ExperimentError::NoCompletedTrials)));
    }
}
