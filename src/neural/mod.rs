//! Pairwise comparator surrogate.
//!
//! A shared dense feature extractor embeds each design; a weight-symmetric
//! head compares two embeddings and predicts which design is cheaper. The
//! search loop uses it to filter candidates before any oracle call.
//!
//! ```ignore
//! use pairsearch::neural::{self, data::pairs, training};
//! let pairs = pairs::combine(pool.designs(), k_top, &mut rng)?;
//! let (train, valid) = pairs::shuffle_and_split(pairs, 0.2, &mut rng);
//! let normalizer = data::Normalizer::fit_pairs(&train, dims);
//! let (model, report) =
//!     training::train_comparator(model, &train, &valid, &normalizer, &config, &device);
//! ```

pub mod checkpoint;
pub mod data;
pub mod inference;
pub mod model;
pub mod report;
pub mod training;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;

use crate::design::Design;
use crate::error::Result;
use data::normalize::Normalizer;
use data::pairs::{combine, shuffle_and_split};
use inference::Comparator;
use model::comparator::{ComparatorConfig, PairwiseComparator};
use training::supervised::{train_comparator, TrainingConfig, TrainingReport};

/// Outcome of one retraining pass.
pub struct Retrained<B: AutodiffBackend> {
    /// Trainable model, kept for warm starts.
    pub model: PairwiseComparator<B>,
    pub normalizer: Normalizer,
    pub report: TrainingReport,
}

impl<B: AutodiffBackend> Retrained<B> {
    /// Inference copy on the inner backend.
    pub fn comparator(&self, device: &B::Device) -> Comparator<B::InnerBackend> {
        Comparator::new(self.model.valid(), self.normalizer.clone(), device.clone())
    }
}

/// Build pairs from `designs`, fit the normalizer on the training split and
/// train. A fresh model is initialized unless `warm` carries one.
pub fn retrain<B: AutodiffBackend, R: Rng + ?Sized>(
    designs: &[Design],
    k_top: usize,
    comparator: &ComparatorConfig,
    training: &TrainingConfig,
    warm: Option<PairwiseComparator<B>>,
    rng: &mut R,
    device: &B::Device,
) -> Result<Retrained<B>> {
    let dims = designs.first().map(Design::dims).unwrap_or(0);
    let pairs = combine(designs, k_top, rng)?;
    let (train, valid) = shuffle_and_split(pairs, training.valid_frac, rng);
    let normalizer = Normalizer::fit_pairs(&train, dims);

    let model = warm.unwrap_or_else(|| comparator.init::<B>(dims, device));
    let (model, report) = train_comparator(model, &train, &valid, &normalizer, training, device);
    Ok(Retrained {
        model,
        normalizer,
        report,
    })
}
