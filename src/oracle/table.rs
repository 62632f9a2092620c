//! Lookup-table oracle over a precomputed parameter sweep.
//!
//! Metrics are stored row-major over the design parameters (the last
//! parameter varies fastest). Cost is computed from the metrics with a
//! [`SpecCost`] that penalizes unmet specifications.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Evaluation, Oracle};
use crate::design::{ParamSpace, ParamSpec};
use crate::error::{OracleError, Result, SearchError};

/// One specification term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Penalize `|cur/min - 1|` when the metric falls below `min`.
    AtLeast(f64),
    /// Penalize `|cur/max - 1|` when the metric exceeds `max`.
    AtMost(f64),
    /// Always add `weight * |cur/norm|`.
    Minimize { norm: f64, weight: f64 },
    /// Add the metric as is, sign included.
    Value,
}

impl Target {
    fn penalty(&self, cur: f64) -> f64 {
        match *self {
            Target::AtLeast(min) if cur < min => (cur / min - 1.0).abs(),
            Target::AtMost(max) if cur > max => (cur / max - 1.0).abs(),
            Target::Minimize { norm, weight } => weight * (cur / norm).abs(),
            Target::Value => cur,
            _ => 0.0,
        }
    }
}

/// Cost as a sum of per-metric specification penalties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecCost {
    pub targets: Vec<(String, Target)>,
}

impl SpecCost {
    pub fn new(targets: Vec<(String, Target)>) -> Self {
        Self { targets }
    }

    /// Single-stage amplifier toy: bandwidth >= 1 GHz, gain >= 3, and
    /// bias current minimized against 1 mA.
    pub fn amplifier() -> Self {
        Self::new(vec![
            ("bw".to_string(), Target::AtLeast(1e9)),
            ("gain".to_string(), Target::AtLeast(3.0)),
            (
                "ibias".to_string(),
                Target::Minimize {
                    norm: 1e-3,
                    weight: 0.1,
                },
            ),
        ])
    }

    /// Cost of a metric map. Missing metrics contribute nothing.
    pub fn cost(&self, metrics: &BTreeMap<String, f64>) -> f64 {
        self.targets
            .iter()
            .filter_map(|(name, target)| metrics.get(name).map(|&v| target.penalty(v)))
            .sum()
    }
}

impl Default for SpecCost {
    fn default() -> Self {
        Self::amplifier()
    }
}

/// On-disk sweep description.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepFile {
    pub params: Vec<ParamSpec>,
    /// Flat row-major metric arrays, one entry per design.
    pub metrics: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub cost: SpecCost,
}

/// Table-lookup oracle.
#[derive(Clone, Debug)]
pub struct TableOracle {
    lens: Vec<usize>,
    metrics: BTreeMap<String, Vec<f64>>,
    cost: SpecCost,
}

impl TableOracle {
    /// Build from metric arrays; every array must cover the full grid.
    pub fn new(
        lens: Vec<usize>,
        metrics: BTreeMap<String, Vec<f64>>,
        cost: SpecCost,
    ) -> Result<Self> {
        let cells = lens.iter().product::<usize>();
        if lens.is_empty() || cells == 0 {
            return Err(SearchError::invalid("sweep table has an empty axis"));
        }
        for (name, values) in &metrics {
            if values.len() != cells {
                return Err(SearchError::invalid(format!(
                    "metric '{}' has {} entries, grid {:?} needs {}",
                    name,
                    values.len(),
                    lens,
                    cells
                )));
            }
        }
        Ok(Self {
            lens,
            metrics,
            cost,
        })
    }

    /// Table whose only metric is `cost`, filled from `f(params)`.
    pub fn from_fn(lens: Vec<usize>, f: impl Fn(&[usize]) -> f64) -> Result<Self> {
        let cells = lens.iter().product::<usize>();
        let mut values = Vec::with_capacity(cells);
        for flat in 0..cells {
            values.push(f(&unflatten(flat, &lens)));
        }
        let metrics = [("cost".to_string(), values)].into_iter().collect();
        let cost = SpecCost::new(vec![("cost".to_string(), Target::Value)]);
        Self::new(lens, metrics, cost)
    }

    /// Load a sweep file and the parameter space it describes.
    pub fn load(path: &Path) -> Result<(ParamSpace, Self)> {
        let text = std::fs::read_to_string(path)?;
        let sweep: SweepFile = serde_json::from_str(&text)?;
        let space = ParamSpace::new(sweep.params)?;
        let oracle = Self::new(space.lens(), sweep.metrics, sweep.cost)?;
        Ok((space, oracle))
    }

    pub fn lens(&self) -> &[usize] {
        &self.lens
    }

    fn flat_index(&self, params: &[usize]) -> Result<usize, OracleError> {
        if params.len() != self.lens.len() {
            return Err(OracleError::Arity {
                expected: self.lens.len(),
                actual: params.len(),
            });
        }
        let mut flat = 0;
        for (param, (&index, &len)) in params.iter().zip(&self.lens).enumerate() {
            if index >= len {
                return Err(OracleError::OutOfRange { param, index, len });
            }
            flat = flat * len + index;
        }
        Ok(flat)
    }

    /// Cost of one design without going through [`Oracle::evaluate`].
    pub fn cost_at(&self, params: &[usize]) -> Result<f64, OracleError> {
        let flat = self.flat_index(params)?;
        Ok(self.cost.cost(&self.cell(flat)))
    }

    /// Costs of every grid cell, row-major.
    pub fn cost_surface(&self) -> Vec<f64> {
        let cells = self.lens.iter().product::<usize>();
        (0..cells).map(|flat| self.cost.cost(&self.cell(flat))).collect()
    }

    /// Lowest-cost grid cell.
    pub fn minimum(&self) -> (Vec<usize>, f64) {
        let (flat, cost) = self
            .cost_surface()
            .into_iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, f64::INFINITY));
        (unflatten(flat, &self.lens), cost)
    }

    fn cell(&self, flat: usize) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .map(|(name, values)| (name.clone(), values[flat]))
            .collect()
    }
}

impl Oracle for TableOracle {
    fn evaluate(&mut self, params: &[usize]) -> Result<Evaluation, OracleError> {
        let flat = self.flat_index(params)?;
        let metrics = self.cell(flat);
        Ok(Evaluation {
            cost: self.cost.cost(&metrics),
            metrics,
        })
    }
}

/// Grid coordinates of a row-major flat index.
pub fn unflatten(mut flat: usize, lens: &[usize]) -> Vec<usize> {
    let mut params = vec![0; lens.len()];
    for (slot, &len) in params.iter_mut().zip(lens).rev() {
        *slot = flat % len;
        flat /= len;
    }
    params
}
