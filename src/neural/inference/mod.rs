//! Inference-side comparator.
//!
//! The search loop only needs "which of these two is better", so it talks
//! to [`PairJudge`]. A trained [`Comparator`] is one judge; tests and
//! diagnostics plug in exact judges backed by known costs.

use burn::prelude::*;

use crate::neural::data::normalize::Normalizer;
use crate::neural::model::comparator::{
    PairwiseComparator, FIRST_NOT_WORSE, FIRST_WORSE, NUM_CLASSES,
};

/// Class with the higher probability; ties go to [`FIRST_NOT_WORSE`].
pub fn predicted_class(probs: [f32; NUM_CLASSES]) -> usize {
    if probs[FIRST_WORSE] > probs[FIRST_NOT_WORSE] {
        FIRST_WORSE
    } else {
        FIRST_NOT_WORSE
    }
}

/// Pairwise preference oracle over parameter vectors.
pub trait PairJudge {
    /// Class probabilities for the ordered pair `(first, second)`.
    fn judge(&self, first: &[usize], second: &[usize]) -> [f32; NUM_CLASSES];

    /// Probabilities for many pairs at once.
    fn judge_batch(&self, pairs: &[(&[usize], &[usize])]) -> Vec<[f32; NUM_CLASSES]> {
        pairs.iter().map(|(a, b)| self.judge(a, b)).collect()
    }

    /// Predicted class of `(first, second)`.
    fn classify(&self, first: &[usize], second: &[usize]) -> usize {
        predicted_class(self.judge(first, second))
    }
}

impl<J: PairJudge + ?Sized> PairJudge for &J {
    fn judge(&self, first: &[usize], second: &[usize]) -> [f32; NUM_CLASSES] {
        (**self).judge(first, second)
    }
}

/// Judge backed by a known cost function. Never wrong; used to measure the
/// search loop apart from the surrogate.
pub struct ExactJudge<F> {
    cost: F,
}

impl<F: Fn(&[usize]) -> f64> ExactJudge<F> {
    pub fn new(cost: F) -> Self {
        Self { cost }
    }
}

impl<F: Fn(&[usize]) -> f64> PairJudge for ExactJudge<F> {
    fn judge(&self, first: &[usize], second: &[usize]) -> [f32; NUM_CLASSES] {
        let mut probs = [0.0; NUM_CLASSES];
        if (self.cost)(first) > (self.cost)(second) {
            probs[FIRST_WORSE] = 1.0;
        } else {
            probs[FIRST_NOT_WORSE] = 1.0;
        }
        probs
    }
}

/// Trained comparator with its frozen normalization statistics.
pub struct Comparator<B: Backend> {
    pub model: PairwiseComparator<B>,
    pub normalizer: Normalizer,
    pub device: B::Device,
}

impl<B: Backend> Comparator<B> {
    pub fn new(model: PairwiseComparator<B>, normalizer: Normalizer, device: B::Device) -> Self {
        Self {
            model,
            normalizer,
            device,
        }
    }

    fn rows<'a>(&self, rows: impl Iterator<Item = &'a [usize]>, n: usize) -> Tensor<B, 2> {
        let d = self.normalizer.dims();
        let data = self.normalizer.apply_rows(rows);
        Tensor::from_data(TensorData::new(data, [n, d]), &self.device)
    }
}

impl<B: Backend> PairJudge for Comparator<B> {
    fn judge(&self, first: &[usize], second: &[usize]) -> [f32; NUM_CLASSES] {
        self.judge_batch(&[(first, second)])
            .pop()
            .unwrap_or([0.5; NUM_CLASSES])
    }

    fn judge_batch(&self, pairs: &[(&[usize], &[usize])]) -> Vec<[f32; NUM_CLASSES]> {
        if pairs.is_empty() {
            return Vec::new();
        }
        let n = pairs.len();
        let first = self.rows(pairs.iter().map(|p| p.0), n);
        let second = self.rows(pairs.iter().map(|p| p.1), n);
        let probs: Vec<f32> = self
            .model
            .predict(first, second)
            .into_data()
            .iter::<f32>()
            .collect();
        probs
            .chunks_exact(NUM_CLASSES)
            .map(|c| [c[0], c[1]])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::model::comparator::ComparatorConfig;
    use burn::backend::NdArray;

    #[test]
    fn tie_goes_to_first() {
        assert_eq!(predicted_class([0.5, 0.5]), FIRST_NOT_WORSE);
        assert_eq!(predicted_class([0.4, 0.6]), FIRST_WORSE);
        assert_eq!(predicted_class([0.9, 0.1]), FIRST_NOT_WORSE);
    }

    #[test]
    fn exact_judge_orders_by_cost() {
        let judge = ExactJudge::new(|p: &[usize]| p[0] as f64);
        assert_eq!(judge.classify(&[3], &[1]), FIRST_WORSE);
        assert_eq!(judge.classify(&[1], &[3]), FIRST_NOT_WORSE);
        assert_eq!(judge.classify(&[2], &[2]), FIRST_NOT_WORSE);
    }

    #[test]
    fn batch_matches_single() {
        let device = Default::default();
        let model = ComparatorConfig::new().init::<NdArray>(3, &device);
        let judge = Comparator::new(model, Normalizer::identity(3), device);

        let a: &[usize] = &[1, 2, 3];
        let b: &[usize] = &[3, 0, 1];
        let c: &[usize] = &[0, 0, 7];
        let pairs = [(a, b), (b, c), (c, a)];
        let batch = judge.judge_batch(&pairs);
        assert_eq!(batch.len(), 3);
        for (probs, &(x, y)) in batch.iter().zip(pairs.iter()) {
            let single = judge.judge(x, y);
            assert!((probs[0] - single[0]).abs() < 1e-5);
            assert!((probs[0] + probs[1] - 1.0).abs() < 1e-5);
        }
        // Swapped operands flip the prediction of the symmetric head.
        let ab = judge.judge(a, b);
        let ba = judge.judge(b, a);
        assert!((ab[0] - ba[1]).abs() < 1e-4);
    }
}
