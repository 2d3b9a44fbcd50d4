//! First-order update rules over flat parameter tensors

use crate::search::OptimizerKind;

pub const ADAM_BETA1: f64 = 0.9;
pub const ADAM_BETA2: f64 = 0.999;
pub const ADAM_EPSILON: f64 = 1e-8;

/// Optimiser state; `slot` identifies one parameter tensor across steps
#[derive(Debug, Clone)]
pub enum Optimizer {
    Sgd {
        learning_rate: f64,
    },
    Adam {
        learning_rate: f64,
        t: i32,
        m: Vec<Vec<f64>>,
        v: Vec<Vec<f64>>,
    },
}

impl Optimizer {
    pub fn new(kind: OptimizerKind, learning_rate: f64) -> Self {
        match kind {
            OptimizerKind::Sgd => Optimizer::Sgd { learning_rate },
            OptimizerKind::Adam => Optimizer::Adam {
                learning_rate,
                t: 0,
                m: Vec::new(),
                v: Vec::new(),
            },
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            Optimizer::Sgd { .. } => OptimizerKind::Sgd,
            Optimizer::Adam { .. } => OptimizerKind::Adam,
        }
    }

    /// Advance the step counter; call once before updating the tensors of a step
    pub fn begin_step(&mut self) {
        if let Optimizer::Adam { t, .. } = self {
            *t += 1;
        }
    }

    pub fn update(&mut self, slot: usize, params: &mut [f64], grads: &[f64]) {
        match self {
            Optimizer::Sgd { learning_rate } => {
                for (p, g) in params.iter_mut().zip(grads) {
                    *p -= *learning_rate * g;
                }
            }
            Optimizer::Adam {
                learning_rate,
                t,
                m,
                v,
            } => {
                while m.len() <= slot {
                    m.push(Vec::new());
                    v.push(Vec::new());
                }
                if m[slot].len() != params.len() {
                    m[slot] = vec![0.0; params.len()];
                    v[slot] = vec![0.0; params.len()];
                }

                let bias1 = 1.0 - ADAM_BETA1.powi(*t);
                let bias2 = 1.0 - ADAM_BETA2.powi(*t);
                for (i, (p, &g)) in params.iter_mut().zip(grads).enumerate() {
                    m[slot][i] = ADAM_BETA1 * m[slot][i] + (1.0 - ADAM_BETA1) * g;
                    v[slot][i] = ADAM_BETA2 * v[slot][i] + (1.0 - ADAM_BETA2) * g * g;
                    let m_hat = m[slot][i] / bias1;
                    let v_hat = v[slot][i] / bias2;
                    *p -= *learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
                }
            }
        }
    }
}
