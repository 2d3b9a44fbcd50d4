//! Stratified partitioning and leakage bookkeeping
//!
//! A [`Partition`] is an immutable set of samples tagged with its role in the
//! experiment. [`split`] draws a stratified held-out partition,
//! [`split_validation`] redraws a validation partition from training data,
//! and [`LeakageGuard`] fails fast when a held-out record shows up anywhere
//! it must not.

use crate::core::{Dataset, ExperimentError, PartitionKind, RecordId, Result, Sample};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Reverse;
use std::collections::HashSet;

/// Immutable, tagged subset of an encoded dataset
#[derive(Debug, Clone)]
pub struct Partition {
    kind: PartitionKind,
    samples: Vec<Sample>,
    dim: usize,
    n_classes: usize,
    scaled: bool,
}

impl Partition {
    /// Create a partition, checking feature width and label range
    pub fn new(
        kind: PartitionKind,
        samples: Vec<Sample>,
        dim: usize,
        n_classes: usize,
    ) -> Result<Self> {
        for sample in &samples {
            if sample.dim() != dim {
                return Err(ExperimentError::DimensionMismatch {
                    expected: dim,
                    actual: sample.dim(),
                });
            }
            if sample.label >= n_classes {
                return Err(ExperimentError::InvalidDataset(format!(
                    "record {} has label {} but only {} classes are declared",
                    sample.id, sample.label, n_classes
                )));
            }
        }
        Ok(Self {
            kind,
            samples,
            dim,
            n_classes,
            scaled: false,
        })
    }

    /// Role of this partition
    pub fn kind(&self) -> PartitionKind {
        self.kind
    }

    /// Samples in partition order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Record identities in partition order
    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.samples.iter().map(|s| s.id)
    }

    /// Whether a fitted scaler has already been applied
    pub fn is_scaled(&self) -> bool {
        self.scaled
    }

    /// Replace every sample's features, keeping ids, labels and role
    pub(crate) fn map_features<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        let samples = self
            .samples
            .iter()
            .map(|s| Sample::new(s.id, f(&s.features), s.label))
            .collect();
        Self {
            kind: self.kind,
            samples,
            dim: self.dim,
            n_classes: self.n_classes,
            scaled: true,
        }
    }

    fn derive(&self, kind: PartitionKind, samples: Vec<Sample>) -> Self {
        Self {
            kind,
            samples,
            dim: self.dim,
            n_classes: self.n_classes,
            scaled: self.scaled,
        }
    }
}

impl Dataset for Partition {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn get_sample(&self, i: usize) -> &Sample {
        &self.samples[i]
    }
}

/// Stratified (train, test) split
///
/// Deterministic for a given seed. `test_fraction` must lie in (0, 1).
pub fn split(source: &Partition, test_fraction: f64, seed: u64) -> Result<(Partition, Partition)> {
    stratified_split(
        source,
        test_fraction,
        seed,
        PartitionKind::Train,
        PartitionKind::Test,
    )
}

/// Stratified (sub-train, validation) split of a training partition
pub fn split_validation(
    train: &Partition,
    validation_fraction: f64,
    seed: u64,
) -> Result<(Partition, Partition)> {
    if train.kind() != PartitionKind::Train {
        return Err(ExperimentError::DataLeakage(format!(
            "validation data must be drawn from the train partition, got {}",
            train.kind()
        )));
    }
    stratified_split(
        train,
        validation_fraction,
        seed,
        PartitionKind::Train,
        PartitionKind::Validation,
    )
}

fn stratified_split(
    source: &Partition,
    fraction: f64,
    seed: u64,
    keep_kind: PartitionKind,
    held_kind: PartitionKind,
) -> Result<(Partition, Partition)> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ExperimentError::InvalidParameter(format!(
            "split fraction must be in (0, 1), got {fraction}"
        )));
    }
    let n = source.len();
    if n == 0 {
        return Err(ExperimentError::EmptyDataset);
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); source.n_classes()];
    for (idx, sample) in source.samples().iter().enumerate() {
        by_class[sample.label].push(idx);
    }
    for (class, members) in by_class.iter().enumerate() {
        if members.len() == 1 {
            return Err(ExperimentError::StratificationImpossible { class, count: 1 });
        }
    }
    let present = by_class.iter().filter(|m| !m.is_empty()).count();

    let n_held = ((fraction * n as f64) - 1e-9).ceil().max(0.0) as usize;
    let n_keep = n - n_held;
    if n_held < present || n_keep < present {
        return Err(ExperimentError::InvalidParameter(format!(
            "split of {n} records into {n_keep}/{n_held} cannot hold all {present} classes"
        )));
    }

    let quotas = allocate(&by_class, n_held, n);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut keep = Vec::with_capacity(n_keep);
    let mut held = Vec::with_capacity(n_held);
    for (members, &quota) in by_class.iter().zip(&quotas) {
        let mut members = members.clone();
        members.shuffle(&mut rng);
        let (h, k) = members.split_at(quota);
        held.extend(h.iter().map(|&i| source.samples()[i].clone()));
        keep.extend(k.iter().map(|&i| source.samples()[i].clone()));
    }
    keep.shuffle(&mut rng);
    held.shuffle(&mut rng);

    debug!(
        "Stratified split of {} {} records: {} {}, {} {} (seed {})",
        n,
        source.kind(),
        keep.len(),
        keep_kind,
        held.len(),
        held_kind,
        seed
    );

    Ok((source.derive(keep_kind, keep), source.derive(held_kind, held)))
}

/// Largest-remainder allocation of `n_held` slots proportional to class size
fn allocate(by_class: &[Vec<usize>], n_held: usize, n: usize) -> Vec<usize> {
    let mut quotas: Vec<usize> = by_class.iter().map(|m| m.len() * n_held / n).collect();
    let assigned: usize = quotas.iter().sum();

    let mut order: Vec<usize> = (0..by_class.len())
        .filter(|&c| quotas[c] < by_class[c].len())
        .collect();
    // Larger remainder first; lower class index on ties
    order.sort_by(|&a, &b| {
        let ra = by_class[a].len() * n_held % n;
        let rb = by_class[b].len() * n_held % n;
        rb.cmp(&ra).then(a.cmp(&b))
    });

    for &class in order.iter().take(n_held - assigned) {
        quotas[class] += 1;
    }

    // Each present class keeps at least one record on both sides. Slots move
    // from the class with the most to spare, lower index on ties.
    for class in 0..by_class.len() {
        if by_class[class].len() >= 2 && quotas[class] == 0 {
            let donor = (0..by_class.len())
                .filter(|&c| quotas[c] > 1)
                .max_by_key(|&c| (quotas[c], Reverse(c)));
            if let Some(donor) = donor {
                quotas[donor] -= 1;
                quotas[class] += 1;
            }
        }
    }
    for class in 0..by_class.len() {
        let size = by_class[class].len();
        if size >= 2 && quotas[class] == size {
            let taker = (0..by_class.len())
                .filter(|&c| by_class[c].len() >= quotas[c] + 2)
                .max_by_key(|&c| (by_class[c].len() - quotas[c], Reverse(c)));
            if let Some(taker) = taker {
                quotas[class] -= 1;
                quotas[taker] += 1;
            }
        }
    }
    quotas
}

/// Set of held-out record ids that must never reach training or validation
#[derive(Debug, Clone, Default)]
pub struct LeakageGuard {
    held_out: HashSet<RecordId>,
}

impl LeakageGuard {
    /// Register every record of a held-out partition
    pub fn new<I: IntoIterator<Item = RecordId>>(held_out: I) -> Self {
        Self {
            held_out: held_out.into_iter().collect(),
        }
    }

    /// Fail if the partition contains any held-out record
    pub fn check(&self, partition: &Partition) -> Result<()> {
        if let Some(id) = partition.ids().find(|id| self.held_out.contains(id)) {
            return Err(ExperimentError::DataLeakage(format!(
                "held-out record {id} found in {} partition",
                partition.kind()
            )));
        }
        Ok(())
    }

    /// Number of protected records
    pub fn len(&self) -> usize {
        self.held_out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held_out.is_empty()
    }
}
