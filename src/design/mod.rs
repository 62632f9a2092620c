//! Designs and the evaluated design pool.
//!
//! A design is a vector of per-parameter indices into the parameter
//! space's discrete value vectors. Its cost is filled exactly once by the
//! oracle; fitness is always the negated cost.

pub mod pool;
pub mod space;

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::oracle::Evaluation;

pub use pool::DesignPool;
pub use space::{ParamSpace, ParamSpec};

/// One candidate configuration in the search space.
///
/// Equality and hashing look at the parameter vector only, so an evaluated
/// design and a fresh candidate with the same indices compare equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Design {
    params: Vec<usize>,
    cost: Option<f64>,
    #[serde(default)]
    metrics: BTreeMap<String, f64>,
}

impl Design {
    /// Create an unevaluated design.
    pub fn new(params: Vec<usize>) -> Self {
        Self {
            params,
            cost: None,
            metrics: BTreeMap::new(),
        }
    }

    /// Create a design with a known cost.
    pub fn evaluated(params: Vec<usize>, cost: f64) -> Self {
        Self {
            params,
            cost: Some(cost),
            metrics: BTreeMap::new(),
        }
    }

    pub fn params(&self) -> &[usize] {
        &self.params
    }

    pub fn dims(&self) -> usize {
        self.params.len()
    }

    /// Cost from the oracle; lower is better.
    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    /// Fitness is `-cost`.
    pub fn fitness(&self) -> Option<f64> {
        self.cost.map(|c| -c)
    }

    pub fn set_cost(&mut self, cost: f64) {
        self.cost = Some(cost);
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.cost = Some(-fitness);
    }

    pub fn is_evaluated(&self) -> bool {
        self.cost.is_some()
    }

    /// Named performance metrics reported by the oracle.
    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Record an oracle result (cost and metrics).
    pub fn apply(&mut self, evaluation: Evaluation) {
        self.cost = Some(evaluation.cost);
        self.metrics = evaluation.metrics;
    }
}

impl PartialEq for Design {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
    }
}

impl Eq for Design {}

impl Hash for Design {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.params.hash(state);
    }
}

impl std::fmt::Display for Design {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.params)?;
        if let Some(cost) = self.cost {
            write!(f, " -> {:.6}", cost)?;
        }
        Ok(())
    }
}

/// Ascending-cost ordering; unevaluated designs sort last.
pub fn by_cost(a: &Design, b: &Design) -> std::cmp::Ordering {
    let a = a.cost.unwrap_or(f64::INFINITY);
    let b = b.cost.unwrap_or(f64::INFINITY);
    a.total_cmp(&b)
}
