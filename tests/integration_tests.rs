//! Integration tests for the experiment pipeline
//!
//! These exercise the public API end to end on synthetic tabular data.

use cardiotune::api::Experiment;
use cardiotune::data::{split, split_validation, EncodedDataset, LeakageGuard};
use cardiotune::search::{
    FixedSampler, LayerConfig, MedianPruner, OptimizerKind, PruneDecision, PrunerConfig,
    RandomSampler, SearchSpace, Study, TrialConfig, TrialStatus,
};
use cardiotune::training::{evaluate, train_final};
use cardiotune::utils::validation::majority_baseline;
use cardiotune::{Dataset, ExperimentError, PartitionKind, RecordId, Sample, StandardScaler};
use std::collections::HashSet;

/// 100 records, 2 balanced classes, 10 numeric features
fn synthetic(n: usize) -> EncodedDataset {
    let samples = (0..n)
        .map(|i| {
            let label = i % 2;
            let center = if label == 1 { 1.5 } else { -1.5 };
            let features = (0..10)
                .map(|j| {
                    let noise = (((i * 31 + j * 17) % 23) as f64 / 23.0 - 0.5) * 1.2;
                    if j < 3 {
                        center + noise
                    } else {
                        noise * 3.0
                    }
                })
                .collect();
            Sample::new(RecordId(i), features, label)
        })
        .collect();
    let names = (0..10).map(|j| format!("f{j}")).collect();
    EncodedDataset::from_samples(names, samples).unwrap()
}

fn paper_config() -> TrialConfig {
    TrialConfig::new(
        vec![LayerConfig::new(8, 0.28)],
        0.009,
        10,
        30,
        OptimizerKind::Adam,
    )
    .unwrap()
}

#[test]
fn test_split_100_records_seed_101() {
    let dataset = synthetic(100);
    let (train, test) = split(&dataset.to_partition().unwrap(), 0.2, 101).unwrap();

    assert_eq!(train.len(), 80);
    assert_eq!(test.len(), 20);
    for count in test.class_counts() {
        assert!((8..=12).contains(&count), "test class count {count}");
    }
    for count in train.class_counts() {
        assert!((32..=48).contains(&count), "train class count {count}");
    }
}

#[test]
fn test_stratified_proportions_within_tolerance() {
    let dataset = synthetic(100);
    let full = dataset.to_partition().unwrap();
    for seed in 0..20 {
        for fraction in [0.1, 0.2, 0.33] {
            let (train, test) = split(&full, fraction, seed).unwrap();
            for part in [&train, &test] {
                let share = part.class_counts()[1] as f64 / part.len() as f64;
                assert!((share - 0.5).abs() <= 1.0 / part.len() as f64);
            }
        }
    }
}

#[test]
fn test_scaler_standardises_training_data() {
    let dataset = synthetic(100);
    let (train, _) = split(&dataset.to_partition().unwrap(), 0.2, 101).unwrap();
    let scaled = StandardScaler::fit(&train)
        .unwrap()
        .transform(&train)
        .unwrap();

    for j in 0..scaled.dim() {
        let column: Vec<f64> = scaled.samples().iter().map(|s| s.features[j]).collect();
        let mean = column.iter().sum::<f64>() / column.len() as f64;
        let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / column.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!((var - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_no_test_record_in_any_validation_split() {
    let dataset = synthetic(100);
    let (train, test) = split(&dataset.to_partition().unwrap(), 0.2, 101).unwrap();
    let test_ids: HashSet<RecordId> = test.ids().collect();
    let guard = LeakageGuard::new(test.ids());

    for trial in 0..50u64 {
        let (sub, val) = split_validation(&train, 0.2, 101 + trial + 1).unwrap();
        assert!(sub.ids().all(|id| !test_ids.contains(&id)));
        assert!(val.ids().all(|id| !test_ids.contains(&id)));
        guard.check(&sub).unwrap();
        guard.check(&val).unwrap();
        assert_eq!(val.kind(), PartitionKind::Validation);
    }
    assert!(matches!(
        guard.check(&test),
        Err(ExperimentError::DataLeakage(_))
    ));
}

#[test]
fn test_single_layer_beats_majority_baseline() {
    let dataset = synthetic(100);
    let mut sampler = FixedSampler::new(vec![paper_config()]);
    let report = Experiment::new()
        .with_seed(101)
        .with_pruner(PrunerConfig::None)
        .run_with_sampler(&dataset, &mut sampler)
        .unwrap();

    let best = &report.best_trial;
    assert_eq!(best.status, TrialStatus::Completed);
    assert_eq!(best.intermediate.len(), 30);
    let value = best.value.unwrap();
    assert!(
        value > majority_baseline(&dataset),
        "validation accuracy {value} does not beat the majority baseline"
    );
}

#[test]
fn test_evaluate_twice_is_identical() {
    let dataset = synthetic(100);
    let (train, test) = split(&dataset.to_partition().unwrap(), 0.2, 101).unwrap();
    let scaler = StandardScaler::fit(&train).unwrap();
    let train = scaler.transform(&train).unwrap();
    let test = scaler.transform(&test).unwrap();

    let (model, _) = train_final(&paper_config(), &train, 101).unwrap();
    let first = evaluate(&model, &test).unwrap();
    let second = evaluate(&model, &test).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_training_is_deterministic() {
    let dataset = synthetic(100);
    let (train, _) = split(&dataset.to_partition().unwrap(), 0.2, 101).unwrap();
    let train = StandardScaler::fit(&train)
        .unwrap()
        .transform(&train)
        .unwrap();

    let (a, history_a) = train_final(&paper_config(), &train, 7).unwrap();
    let (b, history_b) = train_final(&paper_config(), &train, 7).unwrap();
    assert_eq!(history_a, history_b);
    assert_eq!(evaluate(&a, &train).unwrap(), evaluate(&b, &train).unwrap());

    let epochs: Vec<usize> = history_a.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, (0..30).collect::<Vec<_>>());
}

#[test]
fn test_pruned_trial_never_best() {
    let mut study =
        Study::new(SearchSpace::default(), Box::new(MedianPruner::new(1, 0))).with_n_trials(3);
    let mut sampler = RandomSampler::new(0);

    study
        .optimize(&mut sampler, |trial| {
            // Trial 1 starts below the median and is pruned, although its
            // later epochs would have scored higher than anything else
            let curve: &[f64] = match trial.id() {
                0 => &[0.6, 0.7],
                1 => &[0.1, 0.99],
                _ => &[0.65, 0.65],
            };
            for (epoch, &metric) in curve.iter().enumerate() {
                if trial.report(epoch, metric)? == PruneDecision::Prune {
                    return Err(ExperimentError::TrialPruned {
                        trial: trial.id(),
                        epoch,
                    });
                }
            }
            Ok(curve[curve.len() - 1])
        })
        .unwrap();

    assert_eq!(study.trials()[1].status, TrialStatus::Pruned);
    let best = study.best_trial().unwrap();
    assert_eq!(best.status, TrialStatus::Completed);
    assert_eq!(best.id, 0);
}

#[test]
fn test_search_epochs_progress_monotonically() {
    let dataset = synthetic(100);
    let space = SearchSpace::default()
        .with_n_layers(1, 2)
        .with_epochs(8)
        .with_optimizers(vec![OptimizerKind::Adam]);
    let report = Experiment::new()
        .with_n_trials(8)
        .with_space(space)
        .with_pruner(PrunerConfig::Median {
            n_startup_trials: 2,
            n_warmup_epochs: 2,
        })
        .run(&dataset)
        .unwrap();

    for trial in &report.trials {
        assert!(trial.intermediate.len() <= 8);
        match trial.status {
            TrialStatus::Completed => {
                assert_eq!(trial.intermediate.len(), 8);
                assert_eq!(trial.value, trial.intermediate.last().copied());
            }
            TrialStatus::Pruned => {
                assert!(!trial.intermediate.is_empty());
                assert!(trial.value.is_none());
            }
            TrialStatus::Failed => {}
        }
    }
    assert_ne!(report.best_trial.status, TrialStatus::Pruned);
    assert_eq!(report.summary.n_finished, 8);
}

#[test]
fn test_identical_configs_tie_to_earliest() {
    let config = TrialConfig::new(
        vec![LayerConfig::new(4, 0.2)],
        0.01,
        16,
        3,
        OptimizerKind::Sgd,
    )
    .unwrap();
    let mut study = Study::new(SearchSpace::default(), Box::new(MedianPruner::default()))
        .with_n_trials(10);
    let mut sampler = FixedSampler::new(vec![config.clone(), config.clone(), config]);

    study.optimize(&mut sampler, |_| Ok(0.75)).unwrap();

    assert_eq!(study.trials().len(), 3);
    assert_eq!(study.best_trial().unwrap().id, 0);
}
