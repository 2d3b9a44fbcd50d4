//! Multi-layer perceptron classifier
//!
//! - [`layer`]: dense layer, ReLU and inverted dropout
//! - [`optimizer`]: SGD and Adam update rules
//! - [`mlp`]: the network and its manual backpropagation
//! - [`factory`]: construction from a [`crate::search::TrialConfig`]

pub mod factory;
pub mod layer;
pub mod mlp;
pub mod optimizer;

pub use factory::build;
pub use mlp::{HiddenBlock, Network};
pub use optimizer::Optimizer;
