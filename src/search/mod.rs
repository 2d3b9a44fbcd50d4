//! Hyperparameter search: space, samplers, pruners and the study loop

pub mod pruner;
pub mod sampler;
pub mod space;
pub mod study;

pub use pruner::{MedianPruner, NopPruner, PruneDecision, Pruner, PrunerConfig};
pub use sampler::{FixedSampler, RandomSampler, Sampler};
pub use space::{
    FloatRange, IntRange, LayerConfig, OptimizerKind, SearchSpace, TrialConfig, MAX_LAYERS,
};
pub use study::{Study, StudySummary, Trial, TrialRecord, TrialStatus};
