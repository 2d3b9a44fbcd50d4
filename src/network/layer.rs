//! Dense layer with gradient buffers

use rand::Rng;

/// Affine transform `y = W x + b` with row-major `W` of shape (n_out, n_in)
#[derive(Debug, Clone)]
pub struct Dense {
    n_in: usize,
    n_out: usize,
    pub(crate) weights: Vec<f64>,
    pub(crate) bias: Vec<f64>,
    pub(crate) grad_weights: Vec<f64>,
    pub(crate) grad_bias: Vec<f64>,
}

impl Dense {
    /// Uniform initialisation in ±1/sqrt(n_in) for weights and bias
    pub fn new(n_in: usize, n_out: usize, rng: &mut impl Rng) -> Self {
        let bound = 1.0 / (n_in as f64).sqrt();
        let weights = (0..n_in * n_out)
            .map(|_| rng.random_range(-bound..bound))
            .collect();
        let bias = (0..n_out).map(|_| rng.random_range(-bound..bound)).collect();
        Self {
            n_in,
            n_out,
            weights,
            bias,
            grad_weights: vec![0.0; n_in * n_out],
            grad_bias: vec![0.0; n_out],
        }
    }

    pub fn n_in(&self) -> usize {
        self.n_in
    }

    pub fn n_out(&self) -> usize {
        self.n_out
    }

    /// Number of trainable scalars
    pub fn n_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        debug_assert_eq!(input.len(), self.n_in);
        self.weights
            .chunks_exact(self.n_in)
            .zip(&self.bias)
            .map(|(row, &b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }

    /// Accumulate parameter gradients for one sample and return dL/d(input)
    pub fn backward(&mut self, input: &[f64], grad_output: &[f64]) -> Vec<f64> {
        let mut grad_input = vec![0.0; self.n_in];
        for (o, &g) in grad_output.iter().enumerate() {
            if g == 0.0 {
                continue;
            }
            let row = o * self.n_in;
            self.grad_bias[o] += g;
            for (i, &x) in input.iter().enumerate() {
                self.grad_weights[row + i] += g * x;
                grad_input[i] += g * self.weights[row + i];
            }
        }
        grad_input
    }

    pub fn zero_grad(&mut self) {
        self.grad_weights.iter_mut().for_each(|g| *g = 0.0);
        self.grad_bias.iter_mut().for_each(|g| *g = 0.0);
    }

    pub fn is_finite(&self) -> bool {
        self.weights.iter().chain(&self.bias).all(|v| v.is_finite())
    }
}

/// Rectified linear unit, applied element-wise
pub fn relu(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| v.max(0.0)).collect()
}

/// Inverted-dropout mask: kept units are scaled by 1/(1-p)
pub fn dropout_mask(len: usize, p: f64, rng: &mut impl Rng) -> Vec<f64> {
    if p <= 0.0 {
        return vec![1.0; len];
    }
    let scale = 1.0 / (1.0 - p);
    (0..len)
        .map(|_| if rng.random::<f64>() < p { 0.0 } else { scale })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed_dense() -> Dense {
        let mut rng = StdRng::seed_from_u64(0);
        let mut dense = Dense::new(2, 2, &mut rng);
        dense.weights = vec![1.0, 2.0, -1.0, 0.5];
        dense.bias = vec![0.1, -0.2];
        dense
    }

    #[test]
    fn test_init_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let dense = Dense::new(16, 4, &mut rng);
        let bound = 0.25;
        assert!(dense.weights.iter().all(|w| w.abs() <= bound));
        assert!(dense.bias.iter().all(|b| b.abs() <= bound));
        assert_eq!(dense.n_parameters(), 16 * 4 + 4);
    }

    #[test]
    fn test_forward() {
        let dense = fixed_dense();
        let out = dense.forward(&[1.0, 1.0]);
        assert_relative_eq!(out[0], 3.1, epsilon = 1e-12);
        assert_relative_eq!(out[1], -0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_backward_accumulates() {
        let mut dense = fixed_dense();
        let grad_in = dense.backward(&[2.0, 3.0], &[1.0, 0.5]);

        assert_eq!(dense.grad_bias, vec![1.0, 0.5]);
        assert_eq!(dense.grad_weights, vec![2.0, 3.0, 1.0, 1.5]);
        // W^T g = [1*1 + -1*0.5, 2*1 + 0.5*0.5]
        assert_relative_eq!(grad_in[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(grad_in[1], 2.25, epsilon = 1e-12);

        dense.backward(&[2.0, 3.0], &[1.0, 0.5]);
        assert_eq!(dense.grad_bias, vec![2.0, 1.0]);

        dense.zero_grad();
        assert!(dense.grad_weights.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_relu() {
        assert_eq!(relu(&[-1.0, 0.0, 2.5]), vec![0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_dropout_mask() {
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(dropout_mask(3, 0.0, &mut rng), vec![1.0; 3]);

        let mask = dropout_mask(1000, 0.25, &mut rng);
        assert!(mask.iter().all(|&m| m == 0.0 || (m - 1.0 / 0.75).abs() < 1e-12));
        let dropped = mask.iter().filter(|&&m| m == 0.0).count();
        assert!((150..350).contains(&dropped));
    }
}
