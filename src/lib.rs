//! Hyperparameter search and evaluation of a feed-forward classifier for
//! tabular heart-disease records
//!
//! The pipeline encodes a CSV table, draws a stratified held-out test set,
//! searches network configurations with per-trial validation splits and
//! median pruning, refits the best configuration and scores it exactly once
//! on the test set.

pub mod api;
pub mod core;
pub mod data;
pub mod network;
pub mod report;
pub mod search;
pub mod training;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::{Experiment, ExperimentConfig};
pub use crate::core::error::{ExperimentError, Result};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::{EncodedDataset, Partition};
pub use crate::network::Network;
pub use crate::report::ExperimentReport;
pub use crate::search::{SearchSpace, Study, TrialConfig};
pub use crate::training::{evaluate, train_final, EvaluationMetrics};
pub use crate::utils::scaling::StandardScaler;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
