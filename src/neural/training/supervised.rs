//! Supervised comparator training with weighted cross-entropy.
//!
//! Per-pair category weights scale the softmax cross-entropy before the
//! mean; an L2 penalty over every dense weight is added. Adam with a
//! staircase exponential learning-rate decay, stepped once per batch.

use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::neural::data::batch::BatchCursor;
use crate::neural::data::normalize::Normalizer;
use crate::neural::data::pairs::ComparisonPair;
use crate::neural::model::comparator::PairwiseComparator;

/// Training loop configuration.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 50)]
    pub epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    /// Initial learning rate.
    #[config(default = 0.003)]
    pub learning_rate: f64,
    /// Optimizer steps between learning-rate drops.
    #[config(default = 100)]
    pub decay_steps: usize,
    #[config(default = 0.9)]
    pub decay_rate: f64,
    /// Scale of the `sum(w^2) / 2` penalty.
    #[config(default = 0.003)]
    pub l2_scale: f64,
    /// Held-out fraction of the pair set.
    #[config(default = 0.2)]
    pub valid_frac: f64,
    /// Log every this many epochs.
    #[config(default = 10)]
    pub display_step: usize,
}

/// `lr * decay_rate ^ floor(step / decay_steps)`.
pub fn staircase_lr(config: &TrainingConfig, step: usize) -> f64 {
    if config.decay_steps == 0 {
        return config.learning_rate;
    }
    let drops = (step / config.decay_steps) as i32;
    config.learning_rate * config.decay_rate.powi(drops)
}

/// Result of one training epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochResult {
    pub epoch: usize,
    /// Mean batch loss, penalty included.
    pub avg_loss: f32,
    /// Mean batch accuracy on the training split.
    pub train_acc: f32,
    /// Held-out accuracy; only computed on display epochs and the last one.
    pub valid_acc: Option<f32>,
    pub learning_rate: f64,
}

/// Summary of one retraining pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_pairs: usize,
    pub valid_pairs: usize,
    pub steps: usize,
    pub epochs: Vec<EpochResult>,
}

impl TrainingReport {
    pub fn last(&self) -> Option<&EpochResult> {
        self.epochs.last()
    }

    /// Held-out accuracy of the last epoch that measured it.
    pub fn valid_acc(&self) -> Option<f32> {
        self.epochs.iter().rev().find_map(|e| e.valid_acc)
    }
}

/// Normalized pair set laid out row-major for fast batch gathering.
pub struct EncodedPairs {
    dims: usize,
    first: Vec<f32>,
    second: Vec<f32>,
    labels: Vec<i32>,
    weights: Vec<f32>,
}

/// Tensors of one batch.
pub struct PairBatch<B: Backend> {
    pub first: Tensor<B, 2>,
    pub second: Tensor<B, 2>,
    pub labels: Tensor<B, 1, Int>,
    pub weights: Tensor<B, 1>,
}

impl EncodedPairs {
    pub fn new(pairs: &[ComparisonPair], normalizer: &Normalizer) -> Self {
        let dims = normalizer.dims();
        Self {
            dims,
            first: normalizer.apply_rows(pairs.iter().map(|p| p.first.as_slice())),
            second: normalizer.apply_rows(pairs.iter().map(|p| p.second.as_slice())),
            labels: pairs.iter().map(|p| p.label as i32).collect(),
            weights: pairs.iter().map(|p| p.weight).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Gather the rows at `indices`.
    pub fn batch<B: Backend>(&self, indices: &[usize], device: &B::Device) -> PairBatch<B> {
        let d = self.dims;
        let rows = |src: &[f32]| -> Vec<f32> {
            indices
                .iter()
                .flat_map(|&i| src[i * d..(i + 1) * d].iter().copied())
                .collect()
        };
        let n = indices.len();
        PairBatch {
            first: Tensor::from_data(TensorData::new(rows(&self.first), [n, d]), device),
            second: Tensor::from_data(TensorData::new(rows(&self.second), [n, d]), device),
            labels: Tensor::from_data(
                TensorData::new(indices.iter().map(|&i| self.labels[i]).collect::<Vec<_>>(), [n]),
                device,
            ),
            weights: Tensor::from_data(
                TensorData::new(indices.iter().map(|&i| self.weights[i]).collect::<Vec<_>>(), [n]),
                device,
            ),
        }
    }

    pub fn all<B: Backend>(&self, device: &B::Device) -> PairBatch<B> {
        let indices: Vec<usize> = (0..self.len()).collect();
        self.batch(&indices, device)
    }
}

/// Mean of per-example softmax cross-entropy scaled by `weights`.
/// logits: [batch, 2], labels: [batch], weights: [batch]
pub fn weighted_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    labels: Tensor<B, 1, Int>,
    weights: Tensor<B, 1>,
) -> Tensor<B, 1> {
    let log_probs = activation::log_softmax(logits, 1);
    let picked = log_probs.gather(1, labels.unsqueeze_dim::<2>(1)); // [batch, 1]
    (picked * weights.unsqueeze_dim::<2>(1)).mean().neg()
}

/// Number of rows whose argmax matches the label.
pub fn correct_count<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> f32 {
    logits
        .argmax(1)
        .equal(labels.unsqueeze_dim::<2>(1))
        .float()
        .sum()
        .into_scalar()
        .elem::<f32>()
}

/// Accuracy of `model` over an encoded pair set; `None` when empty.
pub fn accuracy<B: Backend>(
    model: &PairwiseComparator<B>,
    pairs: &EncodedPairs,
    device: &B::Device,
) -> Option<f32> {
    if pairs.is_empty() {
        return None;
    }
    let batch = pairs.all::<B>(device);
    let logits = model.forward(batch.first, batch.second);
    Some(correct_count(logits, batch.labels) / pairs.len() as f32)
}

/// Adam, as the comparator has always been trained.
pub fn create_optimizer<B: AutodiffBackend>() -> impl Optimizer<PairwiseComparator<B>, B> {
    AdamConfig::new().init()
}

/// Train the comparator for `config.epochs` epochs.
///
/// Returns the updated model and the per-epoch report.
pub fn train_comparator<B: AutodiffBackend>(
    model: PairwiseComparator<B>,
    train: &[ComparisonPair],
    valid: &[ComparisonPair],
    normalizer: &Normalizer,
    config: &TrainingConfig,
    device: &B::Device,
) -> (PairwiseComparator<B>, TrainingReport) {
    let mut model = model;
    let mut optimizer = create_optimizer::<B>();
    let train_set = EncodedPairs::new(train, normalizer);
    let valid_set = EncodedPairs::new(valid, normalizer);

    let mut report = TrainingReport {
        train_pairs: train_set.len(),
        valid_pairs: valid_set.len(),
        ..Default::default()
    };
    if train_set.is_empty() {
        return (model, report);
    }

    let mut cursor = BatchCursor::new(train_set.len(), config.batch_size);
    let batches = cursor.batches_per_epoch();
    let display_step = config.display_step.max(1);

    for epoch in 0..config.epochs {
        let mut total_loss = 0.0f32;
        let mut total_acc = 0.0f32;
        let mut lr = staircase_lr(config, report.steps);

        for _ in 0..batches {
            let indices = cursor.next_batch();
            let batch = train_set.batch::<B>(&indices, device);
            let logits = model.forward(batch.first, batch.second);
            total_acc += correct_count(logits.clone(), batch.labels.clone()) / indices.len() as f32;

            let ce = weighted_cross_entropy(logits, batch.labels, batch.weights);
            let loss = ce + model.l2_penalty().mul_scalar(config.l2_scale * 0.5);
            total_loss += loss.clone().into_scalar().elem::<f32>();

            lr = staircase_lr(config, report.steps);
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(lr, model, grads);
            report.steps += 1;
        }

        let last = epoch + 1 == config.epochs;
        let valid_acc = if epoch % display_step == 0 || last {
            accuracy(&model.valid(), &valid_set, device)
        } else {
            None
        };
        let result = EpochResult {
            epoch,
            avg_loss: total_loss / batches as f32,
            train_acc: total_acc / batches as f32,
            valid_acc,
            learning_rate: lr,
        };
        if epoch % display_step == 0 {
            info!(
                epoch,
                loss = result.avg_loss,
                train_acc = result.train_acc,
                valid_acc = result.valid_acc.unwrap_or(f32::NAN),
                lr,
                "comparator epoch"
            );
        } else {
            debug!(epoch, loss = result.avg_loss, "comparator epoch");
        }
        report.epochs.push(result);
    }

    (model, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::Design;
    use crate::neural::data::pairs::{combine, shuffle_and_split};
    use crate::neural::model::comparator::ComparatorConfig;
    use burn::backend::{Autodiff, NdArray};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    type B = Autodiff<NdArray>;

    fn quadratic_pool() -> Vec<Design> {
        let mut designs = Vec::new();
        for a in 0..8 {
            for b in 0..8 {
                let cost = ((a as f64) - 2.0).powi(2) + ((b as f64) - 5.0).powi(2);
                designs.push(Design::evaluated(vec![a, b], cost));
            }
        }
        designs
    }

    #[test]
    fn staircase_drops_every_decay_steps() {
        let config = TrainingConfig::new()
            .with_learning_rate(1.0)
            .with_decay_steps(10)
            .with_decay_rate(0.5);
        assert_eq!(staircase_lr(&config, 0), 1.0);
        assert_eq!(staircase_lr(&config, 9), 1.0);
        assert_eq!(staircase_lr(&config, 10), 0.5);
        assert_eq!(staircase_lr(&config, 25), 0.25);
        assert_eq!(staircase_lr(&config.with_decay_steps(0), 1000), 1.0);
    }

    #[test]
    fn weighted_loss_scales_with_weights() {
        let device = Default::default();
        let logits = Tensor::<NdArray, 2>::from_data(
            TensorData::new(vec![0.0f32, 0.0, 0.0, 0.0], [2, 2]),
            &device,
        );
        let labels = Tensor::<NdArray, 1, Int>::from_data(TensorData::new(vec![0i32, 1], [2]), &device);
        let ones = Tensor::<NdArray, 1>::ones([2], &device);
        let halves = Tensor::<NdArray, 1>::ones([2], &device).mul_scalar(0.5);

        let full = weighted_cross_entropy(logits.clone(), labels.clone(), ones)
            .into_scalar()
            .elem::<f32>();
        let half = weighted_cross_entropy(logits, labels, halves)
            .into_scalar()
            .elem::<f32>();
        assert!((full - std::f32::consts::LN_2).abs() < 1e-5);
        assert!((half - full / 2.0).abs() < 1e-5);
    }

    #[test]
    fn training_learns_quadratic_ranking() {
        let device = Default::default();
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let pairs = combine(&quadratic_pool(), 16, &mut rng).unwrap();
        let (train, valid) = shuffle_and_split(pairs, 0.2, &mut rng);
        let normalizer = Normalizer::fit_pairs(&train, 2);

        let config = TrainingConfig::new().with_epochs(60).with_batch_size(64);
        let model = ComparatorConfig::new().init::<B>(2, &device);
        let (_model, report) =
            train_comparator(model, &train, &valid, &normalizer, &config, &device);

        assert_eq!(report.epochs.len(), 60);
        assert_eq!(report.train_pairs, train.len());
        let first = &report.epochs[0];
        let last = report.last().unwrap();
        assert!(last.avg_loss.is_finite());
        assert!(last.avg_loss < first.avg_loss, "{} !< {}", last.avg_loss, first.avg_loss);
        assert!(report.valid_acc().unwrap() > 0.7, "{:?}", report.valid_acc());
    }

    #[test]
    fn empty_training_set_is_noop() {
        let device = Default::default();
        let model = ComparatorConfig::new().init::<B>(2, &device);
        let (_model, report) = train_comparator(
            model,
            &[],
            &[],
            &Normalizer::identity(2),
            &TrainingConfig::new(),
            &device,
        );
        assert_eq!(report.steps, 0);
        assert!(report.epochs.is_empty());
    }
}
