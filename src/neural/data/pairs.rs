//! Labeled comparison pairs from an evaluated design pool.
//!
//! Every pair contains at least one of the `k_top` cheapest designs, which
//! matches inference time where one operand is always the reference
//! design. Pairs between two top designs are rare, so each pair carries a
//! category weight that equalizes the two categories' share of the loss.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::design::{by_cost, Design};
use crate::error::{Result, SearchError};
use crate::neural::model::comparator::{FIRST_NOT_WORSE, FIRST_WORSE, NUM_CLASSES};

/// Which operands of a pair come from the top of the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairCategory {
    /// Both operands are among the `k_top` cheapest.
    BothTop,
    /// One operand is a top design, the other is anywhere below it.
    OneTop,
}

/// A single training pair: ordered operands, class label, loss weight.
#[derive(Clone, Debug)]
pub struct ComparisonPair {
    pub first: Vec<usize>,
    pub second: Vec<usize>,
    /// [`FIRST_WORSE`] iff `costs[0] > costs[1]`, else [`FIRST_NOT_WORSE`].
    pub label: usize,
    /// Raw costs of `(first, second)`, kept for debugging.
    pub costs: [f64; 2],
    pub weight: f32,
    pub category: PairCategory,
}

impl ComparisonPair {
    pub fn one_hot(&self) -> [f32; NUM_CLASSES] {
        let mut v = [0.0; NUM_CLASSES];
        v[self.label] = 1.0;
        v
    }
}

/// Category pair counts and the loss weight assigned to each category.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CategoryWeights {
    /// `k(k-1)/2`.
    pub both_top_count: usize,
    /// `n(n-1)/2 - (n-k)(n-k-1)/2`, every pair touching the top.
    pub one_top_count: usize,
    pub both_top: f32,
    pub one_top: f32,
}

impl CategoryWeights {
    pub fn weight(&self, category: PairCategory) -> f32 {
        match category {
            PairCategory::BothTop => self.both_top,
            PairCategory::OneTop => self.one_top,
        }
    }
}

/// Weights inversely proportional to each category's share, so that
/// `both_top * both_top_count == one_top * one_top_count`.
pub fn category_weights(n: usize, k_top: usize) -> CategoryWeights {
    let g = k_top * k_top.saturating_sub(1) / 2;
    let rest = n.saturating_sub(k_top);
    let b = (n * n.saturating_sub(1) / 2).saturating_sub(rest * rest.saturating_sub(1) / 2);
    let total = (g + b).max(1) as f64;
    CategoryWeights {
        both_top_count: g,
        one_top_count: b,
        both_top: (b as f64 / total) as f32,
        one_top: (g as f64 / total) as f32,
    }
}

/// Number of pairs [`combine`] produces for a pool of `n` designs.
pub fn pair_count(n: usize, k_top: usize) -> usize {
    k_top * n.saturating_sub(1) - k_top * k_top.saturating_sub(1) / 2
}

/// Build the rebalanced pair set from an evaluated pool.
///
/// Sorts by cost, then pairs every top index `i < k_top` with every `j > i`.
/// Each pair is oriented at random. Output order is the generation order;
/// shuffle with [`shuffle_and_split`].
pub fn combine<R: Rng + ?Sized>(
    designs: &[Design],
    k_top: usize,
    rng: &mut R,
) -> Result<Vec<ComparisonPair>> {
    if k_top == 0 || k_top >= designs.len() {
        return Err(SearchError::invalid(format!(
            "k_top must be in 1..{} for a pool of {} designs, got {}",
            designs.len(),
            designs.len(),
            k_top
        )));
    }
    if let Some(d) = designs.iter().find(|d| !d.is_evaluated()) {
        return Err(SearchError::UnevaluatedDesign {
            params: d.params().to_vec(),
        });
    }

    let mut sorted = designs.to_vec();
    sorted.sort_by(by_cost);
    let n = sorted.len();
    let weights = category_weights(n, k_top);

    let mut pairs = Vec::with_capacity(pair_count(n, k_top));
    for i in 0..k_top {
        for j in (i + 1)..n {
            let category = if j < k_top {
                PairCategory::BothTop
            } else {
                PairCategory::OneTop
            };
            let (a, b) = if rng.gen_bool(0.5) {
                (&sorted[i], &sorted[j])
            } else {
                (&sorted[j], &sorted[i])
            };
            // Unwraps are guarded by the evaluated check above.
            let costs = [
                a.cost().unwrap_or(f64::INFINITY),
                b.cost().unwrap_or(f64::INFINITY),
            ];
            let label = if costs[0] > costs[1] {
                FIRST_WORSE
            } else {
                FIRST_NOT_WORSE
            };
            pairs.push(ComparisonPair {
                first: a.params().to_vec(),
                second: b.params().to_vec(),
                label,
                costs,
                weight: weights.weight(category),
                category,
            });
        }
    }
    Ok(pairs)
}

/// Shuffle, then cut the held-out tail: `floor(len * valid_frac)` pairs.
/// Returns (train, valid).
pub fn shuffle_and_split<R: Rng + ?Sized>(
    mut pairs: Vec<ComparisonPair>,
    valid_frac: f64,
    rng: &mut R,
) -> (Vec<ComparisonPair>, Vec<ComparisonPair>) {
    pairs.shuffle(rng);
    let holdout = ((pairs.len() as f64) * valid_frac.clamp(0.0, 1.0)) as usize;
    let split_point = pairs.len() - holdout.min(pairs.len());
    let valid = pairs.split_off(split_point);
    (pairs, valid)
}
