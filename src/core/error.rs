//! Error types for experiment orchestration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid search space: {0}")]
    InvalidSearchSpace(String),

    #[error("Stratified split impossible: class {class} has only {count} member(s), need at least 2")]
    StratificationImpossible { class: usize, count: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Data leakage: {0}")]
    DataLeakage(String),

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("Trial {trial} pruned at epoch {epoch}")]
    TrialPruned { trial: usize, epoch: usize },

    #[error("Sampler exhausted after {0} proposal(s)")]
    SamplerExhausted(usize),

    #[error("No trial completed; cannot select a best configuration")]
    NoCompletedTrials,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, ExperimentError>;
