//! Reference-anchored comparator diagnostics for CLI display.
//!
//! Every sample is judged against the reference design the way candidate
//! filtering does it. A sample cheaper than the reference is "good".

use crate::design::Design;
use crate::error::{Result, SearchError};
use crate::neural::inference::PairJudge;
use crate::neural::model::comparator::{FIRST_NOT_WORSE, FIRST_WORSE};

/// Confusion counts of `judge(reference, sample)` over a sample set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceReport {
    pub reference: Vec<usize>,
    pub reference_cost: f64,
    pub samples: usize,
    pub correct: usize,
    pub good_caught: usize,
    pub good_missed: usize,
    pub bad_caught: usize,
    pub bad_missed: usize,
    /// Samples whose cost equals the reference's.
    pub ties: usize,
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

impl ReferenceReport {
    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.correct, self.samples)
    }

    pub fn good_recall(&self) -> Option<f64> {
        ratio(self.good_caught, self.good_caught + self.good_missed)
    }

    /// Share of "sample is better" predictions that were right.
    pub fn good_precision(&self) -> Option<f64> {
        ratio(self.good_caught, self.good_caught + self.bad_missed)
    }

    pub fn bad_recall(&self) -> Option<f64> {
        ratio(self.bad_caught, self.bad_caught + self.bad_missed)
    }

    pub fn bad_precision(&self) -> Option<f64> {
        ratio(self.bad_caught, self.bad_caught + self.good_missed)
    }

    /// Format the report for CLI display.
    pub fn format_report(&self) -> String {
        let mut out = format!(
            "reference {:?} cost {:.6} vs {} designs\n",
            self.reference, self.reference_cost, self.samples
        );
        let rows = [
            ("accuracy", self.accuracy(), self.correct, self.samples),
            (
                "good recall",
                self.good_recall(),
                self.good_caught,
                self.good_caught + self.good_missed,
            ),
            (
                "good precision",
                self.good_precision(),
                self.good_caught,
                self.good_caught + self.bad_missed,
            ),
            (
                "bad recall",
                self.bad_recall(),
                self.bad_caught,
                self.bad_caught + self.bad_missed,
            ),
            (
                "bad precision",
                self.bad_precision(),
                self.bad_caught,
                self.bad_caught + self.good_missed,
            ),
        ];
        for (label, value, num, den) in rows {
            match value {
                Some(v) => out.push_str(&format!("  {:<15} {:.3}  ({}/{})\n", label, v, num, den)),
                None => out.push_str(&format!("  {:<15} n/a\n", label)),
            }
        }
        out.push_str(&format!("  {:<15} {}\n", "ties", self.ties));
        out
    }
}

/// Judge every sample against `reference`.
pub fn reference_report<J: PairJudge + ?Sized>(
    judge: &J,
    reference: &Design,
    samples: &[Design],
) -> Result<ReferenceReport> {
    let ref_cost = reference.cost().ok_or_else(|| SearchError::UnevaluatedDesign {
        params: reference.params().to_vec(),
    })?;
    let mut report = ReferenceReport {
        reference: reference.params().to_vec(),
        reference_cost: ref_cost,
        samples: samples.len(),
        ..Default::default()
    };

    for sample in samples {
        let cost = sample.cost().ok_or_else(|| SearchError::UnevaluatedDesign {
            params: sample.params().to_vec(),
        })?;
        let expected = if ref_cost > cost {
            FIRST_WORSE
        } else {
            FIRST_NOT_WORSE
        };
        let hit = judge.classify(reference.params(), sample.params()) == expected;
        if hit {
            report.correct += 1;
        }
        match (cost < ref_cost, cost > ref_cost, hit) {
            (true, _, true) => report.good_caught += 1,
            (true, _, false) => report.good_missed += 1,
            (_, true, true) => report.bad_caught += 1,
            (_, true, false) => report.bad_missed += 1,
            _ => report.ties += 1,
        }
    }
    Ok(report)
}

/// How often `(reference, d)` and `(d, reference)` get the same class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapReport {
    pub checked: usize,
    pub inconsistent: usize,
}

impl std::fmt::Display for SwapReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "swap consistency: {}/{} pairs flip",
            self.checked - self.inconsistent,
            self.checked
        )
    }
}

/// Count samples whose prediction does not flip when the operands swap.
pub fn swap_consistency<J: PairJudge + ?Sized>(
    judge: &J,
    reference: &[usize],
    samples: &[Design],
) -> SwapReport {
    let inconsistent = samples
        .iter()
        .filter(|s| judge.classify(reference, s.params()) == judge.classify(s.params(), reference))
        .count();
    SwapReport {
        checked: samples.len(),
        inconsistent,
    }
}
