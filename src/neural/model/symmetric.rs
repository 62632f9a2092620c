//! Weight-symmetric dense layer.
//!
//! The full `[d_input, d_output]` weight is built from a free
//! `[d_input / 2, d_output]` block stacked on top of the same block read in
//! reverse row and column order. The bias is mirrored the same way. Fed
//! with `[f(a), reverse(f(b))]`, swapping `a` and `b` reverses the output
//! channels, so a two-class head flips its prediction.

use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::Initializer;
use burn::prelude::*;

/// Symmetric layer configuration.
#[derive(Config, Debug)]
pub struct SymmetricLinearConfig {
    /// Input width; must be even.
    pub d_input: usize,
    /// Output width; must be even.
    pub d_output: usize,
    /// Initializer for the free weight block.
    #[config(default = "Initializer::XavierNormal { gain: 1.0 }")]
    pub initializer: Initializer,
}

/// Dense layer with mirrored weights (half the free parameters).
#[derive(Module, Debug)]
pub struct SymmetricLinear<B: Backend> {
    /// Free block, `[d_input / 2, d_output]`.
    pub weight: Param<Tensor<B, 2>>,
    /// Free bias half, `[d_output / 2]`.
    pub bias: Param<Tensor<B, 1>>,
}

impl SymmetricLinearConfig {
    /// Initialize the layer.
    ///
    /// Panics on odd widths: the mirrored halves would not tile.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SymmetricLinear<B> {
        assert!(
            self.d_input % 2 == 0 && self.d_output % 2 == 0,
            "symmetric layer needs even widths, got {}x{}",
            self.d_input,
            self.d_output
        );
        let half = self.d_input / 2;
        let weight = self.initializer.init_with(
            [half, self.d_output],
            Some(self.d_input),
            Some(self.d_output),
            device,
        );
        let bias = Initializer::Zeros.init([self.d_output / 2], device);
        SymmetricLinear { weight, bias }
    }
}

impl<B: Backend> SymmetricLinear<B> {
    /// Full mirrored weight, `[d_input, d_output]`.
    pub fn full_weight(&self) -> Tensor<B, 2> {
        let w = self.weight.val();
        let [rows, cols] = w.dims();
        let device = w.device();
        let mirrored = w
            .clone()
            .select(0, reversed::<B>(rows, &device))
            .select(1, reversed::<B>(cols, &device));
        Tensor::cat(vec![w, mirrored], 0)
    }

    /// Full mirrored bias, `[d_output]`.
    pub fn full_bias(&self) -> Tensor<B, 1> {
        let b = self.bias.val();
        let n = b.dims()[0];
        let device = b.device();
        let mirrored = b.clone().select(0, reversed::<B>(n, &device));
        Tensor::cat(vec![b, mirrored], 0)
    }

    /// `[batch, d_input]` → `[batch, d_output]`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        input.matmul(self.full_weight()) + self.full_bias().unsqueeze::<2>()
    }
}

/// Index tensor `[n-1, ..., 1, 0]`.
pub(crate) fn reversed<B: Backend>(n: usize, device: &B::Device) -> Tensor<B, 1, Int> {
    let idx: Vec<i32> = (0..n as i32).rev().collect();
    Tensor::from_data(TensorData::new(idx, [n]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn values(t: Tensor<B, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn full_weight_mirrors_free_block() {
        let device = Default::default();
        let mut layer = SymmetricLinearConfig::new(4, 2).init::<B>(&device);
        let free = Tensor::<B, 2>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0], [2, 2]),
            &device,
        );
        layer.weight = Param::from_tensor(free);

        // Bottom half is the free block reversed along both axes.
        assert_eq!(
            values(layer.full_weight()),
            vec![1.0, 2.0, 3.0, 4.0, 4.0, 3.0, 2.0, 1.0]
        );
        assert_eq!(layer.full_weight().dims(), [4, 2]);
        assert_eq!(layer.full_bias().dims(), [2]);
    }

    #[test]
    fn reversed_input_reverses_output() {
        let device = Default::default();
        let layer = SymmetricLinearConfig::new(6, 4).init::<B>(&device);

        let x = vec![0.3f32, -1.2, 0.7, 2.0, 0.1, -0.4];
        let x_rev: Vec<f32> = x.iter().rev().copied().collect();
        let out = values(layer.forward(Tensor::from_data(TensorData::new(x, [1, 6]), &device)));
        let out_rev =
            values(layer.forward(Tensor::from_data(TensorData::new(x_rev, [1, 6]), &device)));

        for (a, b) in out.iter().zip(out_rev.iter().rev()) {
            assert!((a - b).abs() < 1e-5, "{:?} vs {:?}", out, out_rev);
        }
    }

    #[test]
    #[should_panic(expected = "even widths")]
    fn odd_width_panics() {
        let device = Default::default();
        let _ = SymmetricLinearConfig::new(3, 2).init::<B>(&device);
    }
}
