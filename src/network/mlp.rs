//! Feed-forward classifier: hidden blocks of Dense → ReLU → Dropout,
//! followed by a Dense output layer producing one logit per class.

use crate::core::{softmax, Classifier, ExperimentError, Result, Sample, Trainable};
use crate::network::layer::{dropout_mask, relu, Dense};
use crate::network::optimizer::Optimizer;
use rand::rngs::StdRng;

/// One hidden block of the network
#[derive(Debug, Clone)]
pub struct HiddenBlock {
    pub(crate) dense: Dense,
    pub(crate) dropout: f64,
}

impl HiddenBlock {
    pub fn units(&self) -> usize {
        self.dense.n_out()
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }
}

/// Activations kept from a training-mode forward pass of one sample
#[derive(Debug, Clone)]
struct SampleTrace {
    /// Input of each dense layer, hidden blocks first, output layer last
    inputs: Vec<Vec<f64>>,
    /// Pre-activation of each hidden block
    pre_activations: Vec<Vec<f64>>,
    masks: Vec<Vec<f64>>,
}

/// Multi-layer perceptron with owned optimiser state
#[derive(Debug, Clone)]
pub struct Network {
    hidden: Vec<HiddenBlock>,
    output: Dense,
    optimizer: Optimizer,
    trace: Vec<SampleTrace>,
    has_gradients: bool,
}

impl Network {
    pub(crate) fn new(hidden: Vec<HiddenBlock>, output: Dense, optimizer: Optimizer) -> Self {
        Self {
            hidden,
            output,
            optimizer,
            trace: Vec::new(),
            has_gradients: false,
        }
    }

    /// Hidden blocks in forward order
    pub fn hidden_blocks(&self) -> &[HiddenBlock] {
        &self.hidden
    }

    /// Layer widths from input to output, e.g. `[12, 8, 2]`
    pub fn widths(&self) -> Vec<usize> {
        let mut widths = vec![self.n_inputs()];
        widths.extend(self.hidden.iter().map(HiddenBlock::units));
        widths.push(self.output.n_out());
        widths
    }

    /// Total number of trainable scalars
    pub fn n_parameters(&self) -> usize {
        self.hidden
            .iter()
            .map(|b| b.dense.n_parameters())
            .sum::<usize>()
            + self.output.n_parameters()
    }

    fn check_width(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.n_inputs() {
            return Err(ExperimentError::DimensionMismatch {
                expected: self.n_inputs(),
                actual: features.len(),
            });
        }
        Ok(())
    }

    fn dense_layers_mut(&mut self) -> impl Iterator<Item = &mut Dense> {
        self.hidden
            .iter_mut()
            .map(|b| &mut b.dense)
            .chain(std::iter::once(&mut self.output))
    }
}

impl Classifier for Network {
    fn n_inputs(&self) -> usize {
        self.hidden
            .first()
            .map_or(self.output.n_in(), |b| b.dense.n_in())
    }

    fn n_classes(&self) -> usize {
        self.output.n_out()
    }

    fn logits(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.check_width(features)?;
        let mut activation = features.to_vec();
        for block in &self.hidden {
            activation = relu(&block.dense.forward(&activation));
        }
        Ok(self.output.forward(&activation))
    }
}

impl Trainable for Network {
    fn forward(&mut self, batch: &[&Sample], rng: &mut StdRng) -> Result<Vec<Vec<f64>>> {
        self.trace.clear();
        let mut all_logits = Vec::with_capacity(batch.len());

        for sample in batch {
            self.check_width(&sample.features)?;
            let mut trace = SampleTrace {
                inputs: Vec::with_capacity(self.hidden.len() + 1),
                pre_activations: Vec::with_capacity(self.hidden.len()),
                masks: Vec::with_capacity(self.hidden.len()),
            };

            let mut activation = sample.features.clone();
            for block in &self.hidden {
                let z = block.dense.forward(&activation);
                let mask = dropout_mask(z.len(), block.dropout, rng);
                let next: Vec<f64> = relu(&z).iter().zip(&mask).map(|(a, m)| a * m).collect();
                trace.inputs.push(activation);
                trace.pre_activations.push(z);
                trace.masks.push(mask);
                activation = next;
            }

            all_logits.push(self.output.forward(&activation));
            trace.inputs.push(activation);
            self.trace.push(trace);
        }

        Ok(all_logits)
    }

    fn compute_loss(&mut self, logits: &[Vec<f64>], labels: &[usize]) -> Result<f64> {
        if self.trace.is_empty() || logits.len() != self.trace.len() || labels.len() != logits.len()
        {
            return Err(ExperimentError::InvalidParameter(format!(
                "compute_loss expects the {} rows of the last forward pass, got {} logits and {} labels",
                self.trace.len(),
                logits.len(),
                labels.len()
            )));
        }

        for layer in self.dense_layers_mut() {
            layer.zero_grad();
        }

        let n_classes = self.n_classes();
        let scale = 1.0 / logits.len() as f64;
        let mut total = 0.0;
        let trace = std::mem::take(&mut self.trace);

        for ((row, &label), sample) in logits.iter().zip(labels).zip(&trace) {
            if label >= n_classes {
                return Err(ExperimentError::InvalidDataset(format!(
                    "label {label} out of range for {n_classes} classes"
                )));
            }
            let probs = softmax(row);
            total -= probs[label].max(f64::MIN_POSITIVE).ln();

            // d(mean CE)/d(logits) = (softmax - onehot) / batch
            let mut grad: Vec<f64> = probs
                .iter()
                .enumerate()
                .map(|(c, &p)| (p - if c == label { 1.0 } else { 0.0 }) * scale)
                .collect();

            let last = sample.inputs.len() - 1;
            grad = self.output.backward(&sample.inputs[last], &grad);
            for (idx, block) in self.hidden.iter_mut().enumerate().rev() {
                let dz: Vec<f64> = grad
                    .iter()
                    .zip(&sample.masks[idx])
                    .zip(&sample.pre_activations[idx])
                    .map(|((g, m), &z)| if z > 0.0 { g * m } else { 0.0 })
                    .collect();
                grad = block.dense.backward(&sample.inputs[idx], &dz);
            }
        }

        self.has_gradients = true;
        Ok(total * scale)
    }

    fn step(&mut self) -> Result<()> {
        if !self.has_gradients {
            return Err(ExperimentError::InvalidParameter(
                "step called without gradients from compute_loss".to_string(),
            ));
        }

        let Self {
            hidden,
            output,
            optimizer,
            ..
        } = self;
        optimizer.begin_step();
        let layers = hidden
            .iter_mut()
            .map(|b| &mut b.dense)
            .chain(std::iter::once(output));
        for (idx, layer) in layers.enumerate() {
            optimizer.update(2 * idx, &mut layer.weights, &layer.grad_weights);
            optimizer.update(2 * idx + 1, &mut layer.bias, &layer.grad_bias);
        }
        self.has_gradients = false;
        Ok(())
    }

    fn is_finite(&self) -> bool {
        self.hidden.iter().all(|b| b.dense.is_finite()) && self.output.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordId;
    use crate::search::OptimizerKind;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn network(kind: OptimizerKind, lr: f64, dropout: f64) -> Network {
        let mut rng = StdRng::seed_from_u64(5);
        let hidden = vec![HiddenBlock {
            dense: Dense::new(2, 4, &mut rng),
            dropout,
        }];
        let output = Dense::new(4, 2, &mut rng);
        Network::new(hidden, output, Optimizer::new(kind, lr))
    }

    fn xor_free_batch() -> Vec<Sample> {
        vec![
            Sample::new(RecordId(0), vec![1.0, 1.0], 1),
            Sample::new(RecordId(1), vec![-1.0, -1.0], 0),
            Sample::new(RecordId(2), vec![0.8, 1.2], 1),
            Sample::new(RecordId(3), vec![-1.2, -0.8], 0),
        ]
    }

    #[test]
    fn test_shapes() {
        let net = network(OptimizerKind::Sgd, 0.1, 0.0);
        assert_eq!(net.widths(), vec![2, 4, 2]);
        assert_eq!(net.n_parameters(), (2 * 4 + 4) + (4 * 2 + 2));
        assert_eq!(net.logits(&[0.0, 0.0]).unwrap().len(), 2);
        assert!(matches!(
            net.logits(&[0.0]),
            Err(ExperimentError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_forward_without_dropout_matches_inference() {
        let mut net = network(OptimizerKind::Sgd, 0.1, 0.0);
        let batch = xor_free_batch();
        let refs: Vec<&Sample> = batch.iter().collect();
        let mut rng = StdRng::seed_from_u64(1);
        let train_logits = net.forward(&refs, &mut rng).unwrap();
        for (sample, logits) in batch.iter().zip(&train_logits) {
            let inference = net.logits(&sample.features).unwrap();
            for (a, b) in logits.iter().zip(&inference) {
                assert_relative_eq!(*a, *b);
            }
        }
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut net = network(OptimizerKind::Sgd, 0.1, 0.0);
        let batch = xor_free_batch();
        let refs: Vec<&Sample> = batch.iter().collect();
        let labels: Vec<usize> = batch.iter().map(|s| s.label).collect();
        let mut rng = StdRng::seed_from_u64(1);

        let logits = net.forward(&refs, &mut rng).unwrap();
        net.compute_loss(&logits, &labels).unwrap();
        let analytic = net.hidden[0].dense.grad_weights[0];

        let loss_at = |net: &Network| -> f64 {
            let mut total = 0.0;
            for s in &batch {
                let p = softmax(&net.logits(&s.features).unwrap());
                total -= p[s.label].ln();
            }
            total / batch.len() as f64
        };
        let h = 1e-6;
        let mut plus = net.clone();
        plus.hidden[0].dense.weights[0] += h;
        let mut minus = net.clone();
        minus.hidden[0].dense.weights[0] -= h;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * h);

        assert_relative_eq!(analytic, numeric, epsilon = 1e-6);
    }

    #[test]
    fn test_training_reduces_loss() {
        for kind in [OptimizerKind::Sgd, OptimizerKind::Adam] {
            let mut net = network(kind, 0.05, 0.0);
            let batch = xor_free_batch();
            let refs: Vec<&Sample> = batch.iter().collect();
            let labels: Vec<usize> = batch.iter().map(|s| s.label).collect();
            let mut rng = StdRng::seed_from_u64(1);

            let mut losses = Vec::new();
            for _ in 0..100 {
                let logits = net.forward(&refs, &mut rng).unwrap();
                losses.push(net.compute_loss(&logits, &labels).unwrap());
                net.step().unwrap();
            }
            assert!(losses[99] < losses[0], "{kind:?}: {} !< {}", losses[99], losses[0]);
            assert!(net.is_finite());
        }
    }

    #[test]
    fn test_call_order_enforced() {
        let mut net = network(OptimizerKind::Sgd, 0.1, 0.0);
        assert!(net.step().is_err());
        assert!(net.compute_loss(&[vec![0.0, 0.0]], &[0]).is_err());
    }

    #[test]
    fn test_dropout_changes_training_pass_only() {
        let mut net = network(OptimizerKind::Sgd, 0.1, 0.5);
        // Keep every hidden unit active so a dropped unit always shows up
        net.hidden[0].dense.weights = vec![0.5; 8];
        net.hidden[0].dense.bias = vec![0.1; 4];
        let sample = Sample::new(RecordId(0), vec![1.0, 0.5], 1);
        let mut rng = StdRng::seed_from_u64(2);

        let a = net.logits(&sample.features).unwrap();
        let b = net.logits(&sample.features).unwrap();
        assert_eq!(a, b);

        let passes: Vec<Vec<f64>> = (0..20)
            .map(|_| net.forward(&[&sample], &mut rng).unwrap().remove(0))
            .collect();
        assert!(passes.iter().any(|p| p != &a));
    }
}
