//! Pairwise comparator: shared feature extractor + symmetric comparison head.
//!
//! Both designs of a pair go through the same dense stack. The second
//! embedding is reversed along the channel axis before concatenation, and
//! the head uses [`SymmetricLinear`] layers only, so `(a, b)` and `(b, a)`
//! are pushed toward opposite predictions.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};

use super::symmetric::{reversed, SymmetricLinear, SymmetricLinearConfig};

/// Two classes: index 0 = first is better or equal, index 1 = first is worse.
pub const NUM_CLASSES: usize = 2;
/// Class index: the first design's cost is not greater than the second's.
pub const FIRST_NOT_WORSE: usize = 0;
/// Class index: the first design's cost is strictly greater.
pub const FIRST_WORSE: usize = 1;

/// Comparator architecture.
#[derive(Config, Debug)]
pub struct ComparatorConfig {
    /// Hidden widths of the feature extractor (before the embedding layer).
    #[config(default = "vec![20]")]
    pub feature_hidden: Vec<usize>,
    /// Embedding width per design.
    #[config(default = 20)]
    pub num_features: usize,
    /// Hidden widths of the symmetric head; each must be even.
    #[config(default = "Vec::new()")]
    pub compare_hidden: Vec<usize>,
    /// Initializer for all weights.
    #[config(default = "Initializer::XavierNormal { gain: 1.0 }")]
    pub initializer: Initializer,
}

/// Pairwise ranking network.
#[derive(Module, Debug)]
pub struct PairwiseComparator<B: Backend> {
    /// Shared feature extractor, ReLU after every layer.
    pub features: Vec<Linear<B>>,
    /// Symmetric hidden layers, ReLU after every layer.
    pub compare: Vec<SymmetricLinear<B>>,
    /// Symmetric output layer producing two logits.
    pub output: SymmetricLinear<B>,
}

impl ComparatorConfig {
    /// Initialize for designs with `num_params` parameters.
    pub fn init<B: Backend>(&self, num_params: usize, device: &B::Device) -> PairwiseComparator<B> {
        let mut widths = vec![num_params];
        widths.extend(self.feature_hidden.iter().copied());
        widths.push(self.num_features);
        let features = widths
            .windows(2)
            .map(|w| {
                LinearConfig::new(w[0], w[1])
                    .with_initializer(self.initializer.clone())
                    .init(device)
            })
            .collect();

        let mut d_in = 2 * self.num_features;
        let mut compare = Vec::with_capacity(self.compare_hidden.len());
        for &d_out in &self.compare_hidden {
            compare.push(
                SymmetricLinearConfig::new(d_in, d_out)
                    .with_initializer(self.initializer.clone())
                    .init(device),
            );
            d_in = d_out;
        }
        let output = SymmetricLinearConfig::new(d_in, NUM_CLASSES)
            .with_initializer(self.initializer.clone())
            .init(device);

        PairwiseComparator {
            features,
            compare,
            output,
        }
    }

    /// Free parameter count for designs with `num_params` parameters.
    pub fn param_count(&self, num_params: usize) -> usize {
        let mut widths = vec![num_params];
        widths.extend(self.feature_hidden.iter().copied());
        widths.push(self.num_features);
        let dense: usize = widths.windows(2).map(|w| w[0] * w[1] + w[1]).sum();

        let mut d_in = 2 * self.num_features;
        let mut sym = 0;
        for &d_out in self.compare_hidden.iter().chain(std::iter::once(&NUM_CLASSES)) {
            sym += d_in / 2 * d_out + d_out / 2;
            d_in = d_out;
        }
        dense + sym
    }
}

impl<B: Backend> PairwiseComparator<B> {
    /// Embed a batch of normalized designs, `[batch, num_params]` →
    /// `[batch, num_features]`.
    pub fn embed(&self, designs: Tensor<B, 2>) -> Tensor<B, 2> {
        self.features
            .iter()
            .fold(designs, |x, layer| relu(layer.forward(x)))
    }

    /// Two-class logits for `(first, second)` batches.
    pub fn forward(&self, first: Tensor<B, 2>, second: Tensor<B, 2>) -> Tensor<B, 2> {
        let f1 = self.embed(first);
        let f2 = self.embed(second);
        let width = f2.dims()[1];
        let device = f2.device();
        let f2 = f2.select(1, reversed::<B>(width, &device));

        let x = Tensor::cat(vec![f1, f2], 1);
        let x = self
            .compare
            .iter()
            .fold(x, |x, layer| relu(layer.forward(x)));
        self.output.forward(x)
    }

    /// Class probabilities, `[batch, 2]`.
    pub fn predict(&self, first: Tensor<B, 2>, second: Tensor<B, 2>) -> Tensor<B, 2> {
        softmax(self.forward(first, second), 1)
    }

    /// Sum of squared weights over every dense layer (biases excluded).
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let dense = self
            .features
            .iter()
            .map(|l| l.weight.val().powf_scalar(2.0).sum());
        let sym = self
            .compare
            .iter()
            .chain(std::iter::once(&self.output))
            .map(|l| l.full_weight().powf_scalar(2.0).sum());
        dense
            .chain(sym)
            .reduce(|a, b| a + b)
            .unwrap_or_else(|| Tensor::zeros([1], &self.output.weight.val().device()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn batch(rows: &[[f32; 3]], device: &<B as Backend>::Device) -> Tensor<B, 2> {
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_data(TensorData::new(data, [rows.len(), 3]), device)
    }

    #[test]
    fn forward_shapes() {
        let device = Default::default();
        let model = ComparatorConfig::new()
            .with_compare_hidden(vec![8])
            .init::<B>(3, &device);
        let a = batch(&[[0.1, 0.2, 0.3], [1.0, -1.0, 0.5]], &device);
        let b = batch(&[[0.0, 0.0, 0.0], [0.3, 0.2, 0.1]], &device);
        assert_eq!(model.embed(a.clone()).dims(), [2, 20]);
        assert_eq!(model.forward(a.clone(), b.clone()).dims(), [2, 2]);

        let probs = model.predict(a, b).into_data().to_vec::<f32>().unwrap();
        for row in probs.chunks(2) {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn swapping_operands_swaps_logits() {
        let device = Default::default();
        let model = ComparatorConfig::new()
            .with_compare_hidden(vec![6, 4])
            .init::<B>(3, &device);
        let a = batch(&[[0.4, -0.2, 1.3]], &device);
        let b = batch(&[[-0.7, 0.9, 0.05]], &device);

        let ab = model.forward(a.clone(), b.clone()).into_data().to_vec::<f32>().unwrap();
        let ba = model.forward(b, a).into_data().to_vec::<f32>().unwrap();
        assert!((ab[0] - ba[1]).abs() < 1e-4, "{:?} vs {:?}", ab, ba);
        assert!((ab[1] - ba[0]).abs() < 1e-4, "{:?} vs {:?}", ab, ba);
    }

    #[test]
    fn identical_operands_tie() {
        let device = Default::default();
        let model = ComparatorConfig::new().init::<B>(3, &device);
        let a = batch(&[[0.4, -0.2, 1.3]], &device);
        let p = model.predict(a.clone(), a).into_data().to_vec::<f32>().unwrap();
        assert!((p[0] - 0.5).abs() < 1e-5, "{:?}", p);
    }

    #[test]
    fn l2_penalty_positive() {
        let device = Default::default();
        let model = ComparatorConfig::new().init::<B>(7, &device);
        let l2 = model.l2_penalty().into_data().to_vec::<f32>().unwrap();
        assert_eq!(l2.len(), 1);
        assert!(l2[0] > 0.0);
    }

    #[test]
    fn param_count_halves_head() {
        // 7 -> 20 -> 20 dense, then a 40 -> 2 symmetric head.
        let config = ComparatorConfig::new();
        let dense = (7 * 20 + 20) + (20 * 20 + 20);
        let head = 20 * 2 + 1;
        assert_eq!(config.param_count(7), dense + head);
    }
}
