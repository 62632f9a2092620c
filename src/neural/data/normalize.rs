//! Per-parameter input normalization.
//!
//! Statistics come from the training split of one retraining round and stay
//! frozen until the next round. They are saved next to the model weights.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::pairs::ComparisonPair;

/// Added to the standard deviation so constant columns do not divide by zero.
pub const STD_EPSILON: f64 = 1e-6;

/// Column-wise mean and population standard deviation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Normalizer {
    /// Identity transform for `dims` parameters.
    pub fn identity(dims: usize) -> Self {
        Self {
            mean: vec![0.0; dims],
            std: vec![1.0 - STD_EPSILON; dims],
        }
    }

    /// Fit over the rows of a design matrix.
    pub fn fit<'a>(rows: impl IntoIterator<Item = &'a [usize]>, dims: usize) -> Self {
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); dims];
        for row in rows {
            for (col, &v) in columns.iter_mut().zip(row) {
                col.push(v as f64);
            }
        }
        let mean = columns
            .iter()
            .map(|c| if c.is_empty() { 0.0 } else { c.iter().mean() })
            .collect();
        let std = columns
            .iter()
            .map(|c| {
                if c.len() < 2 {
                    0.0
                } else {
                    c.iter().population_std_dev()
                }
            })
            .collect();
        Self { mean, std }
    }

    /// Fit over both operands of every training pair.
    pub fn fit_pairs(pairs: &[ComparisonPair], dims: usize) -> Self {
        let rows = pairs
            .iter()
            .flat_map(|p| [p.first.as_slice(), p.second.as_slice()]);
        Self::fit(rows, dims)
    }

    pub fn dims(&self) -> usize {
        self.mean.len()
    }

    /// `(x - mean) / (std + 1e-6)`.
    pub fn apply(&self, params: &[usize]) -> Vec<f32> {
        params
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(&x, (&m, &s))| ((x as f64 - m) / (s + STD_EPSILON)) as f32)
            .collect()
    }

    /// Normalize many rows into one flat row-major buffer.
    pub fn apply_rows<'a>(&self, rows: impl IntoIterator<Item = &'a [usize]>) -> Vec<f32> {
        rows.into_iter().flat_map(|r| self.apply(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_and_apply() {
        let rows: Vec<Vec<usize>> = vec![vec![0, 5], vec![2, 5], vec![4, 5]];
        let norm = Normalizer::fit(rows.iter().map(|r| r.as_slice()), 2);
        assert!((norm.mean[0] - 2.0).abs() < 1e-12);
        assert!((norm.std[0] - (8.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert_eq!(norm.std[1], 0.0);

        let x = norm.apply(&[4, 5]);
        assert!((x[0] as f64 - 2.0 / ((8.0f64 / 3.0).sqrt() + STD_EPSILON)).abs() < 1e-5);
        // Constant column maps to zero instead of NaN.
        assert_eq!(x[1], 0.0);
    }

    #[test]
    fn identity_is_noop() {
        let norm = Normalizer::identity(3);
        assert_eq!(norm.apply(&[1, 2, 3]), vec![1.0, 2.0, 3.0]);
        assert_eq!(norm.apply_rows([[1usize, 2, 3].as_slice(); 2]).len(), 6);
    }

    #[test]
    fn fit_pairs_uses_both_operands() {
        let pair = ComparisonPair {
            first: vec![0],
            second: vec![10],
            label: 0,
            costs: [0.0, 1.0],
            weight: 1.0,
            category: super::super::pairs::PairCategory::OneTop,
        };
        let norm = Normalizer::fit_pairs(&[pair], 1);
        assert_eq!(norm.mean, vec![5.0]);
        assert_eq!(norm.std, vec![5.0]);
    }
}
