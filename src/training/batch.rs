//! Per-epoch mini-batch ordering

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Seeded permutation of `0..n` split into ordered batches
///
/// The last batch is short when `n` is not a multiple of `batch_size`.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    indices: Vec<usize>,
    batch_size: usize,
}

impl BatchPlan {
    pub fn new(num_samples: usize, batch_size: usize, rng: &mut StdRng) -> Self {
        let mut indices: Vec<usize> = (0..num_samples).collect();
        indices.shuffle(rng);
        Self {
            indices,
            batch_size: batch_size.max(1),
        }
    }

    /// Full epoch permutation
    pub fn order(&self) -> &[usize] {
        &self.indices
    }

    pub fn n_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    pub fn batches(&self) -> std::slice::Chunks<'_, usize> {
        self.indices.chunks(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_plan_is_permutation_with_short_tail() {
        let mut rng = StdRng::seed_from_u64(4);
        let plan = BatchPlan::new(23, 10, &mut rng);
        assert_eq!(plan.n_batches(), 3);
        let sizes: Vec<usize> = plan.batches().map(<[usize]>::len).collect();
        assert_eq!(sizes, vec![10, 10, 3]);

        let mut seen = plan.order().to_vec();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_plan_is_seeded_and_changes_per_epoch() {
        let mut a = StdRng::seed_from_u64(8);
        let mut b = StdRng::seed_from_u64(8);
        let first = BatchPlan::new(50, 16, &mut a);
        assert_eq!(first.order(), BatchPlan::new(50, 16, &mut b).order());

        let second = BatchPlan::new(50, 16, &mut a);
        assert_ne!(first.order(), second.order());
    }

    #[test]
    fn test_batch_larger_than_data() {
        let mut rng = StdRng::seed_from_u64(0);
        let plan = BatchPlan::new(5, 32, &mut rng);
        assert_eq!(plan.n_batches(), 1);
        assert_eq!(plan.batches().next().map(<[usize]>::len), Some(5));
    }
}
