//! Training, validation and evaluation of networks
//!
//! - [`batch`]: per-epoch seeded batch order
//! - [`trial_loop`]: the train/validate/report state machine
//! - [`final_fit`]: refit of the selected configuration
//! - [`evaluate`]: accuracy, confusion metrics, held-out test and feature importance

pub mod batch;
pub mod evaluate;
pub mod final_fit;
pub mod trial_loop;

pub use batch::BatchPlan;
pub use evaluate::{
    evaluate, evaluate_detailed, permutation_importance, EvaluationMetrics, FeatureImportance,
    HeldOutTest,
};
pub use final_fit::train_final;
pub use trial_loop::{EpochRecord, LoopState, TrainingLoop};
