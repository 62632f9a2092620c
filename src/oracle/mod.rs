//! Expensive design evaluator.
//!
//! The search treats the oracle as an opaque, blocking function from a
//! parameter-index vector to a scalar cost plus named metrics. A sweep
//! table lookup and a live circuit simulation are two implementations of
//! the same trait.

pub mod table;

use std::collections::BTreeMap;

use crate::error::OracleError;

pub use table::{SpecCost, TableOracle, Target};

/// Result of one oracle call.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Scalar objective, lower is better.
    pub cost: f64,
    /// Named performance metrics (gain, bandwidth, ...).
    pub metrics: BTreeMap<String, f64>,
}

impl Evaluation {
    pub fn cost_only(cost: f64) -> Self {
        Self {
            cost,
            metrics: BTreeMap::new(),
        }
    }
}

/// Design evaluator.
pub trait Oracle {
    /// Evaluate one parameter-index vector.
    fn evaluate(&mut self, params: &[usize]) -> Result<Evaluation, OracleError>;
}

impl<F> Oracle for F
where
    F: FnMut(&[usize]) -> Result<Evaluation, OracleError>,
{
    fn evaluate(&mut self, params: &[usize]) -> Result<Evaluation, OracleError> {
        self(params)
    }
}

/// Wraps an oracle and counts calls, for budget accounting.
pub struct CountingOracle<O> {
    inner: O,
    calls: usize,
}

impl<O: Oracle> CountingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self { inner, calls: 0 }
    }

    /// Number of `evaluate` calls made so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl<O: Oracle> Oracle for CountingOracle<O> {
    fn evaluate(&mut self, params: &[usize]) -> Result<Evaluation, OracleError> {
        self.calls += 1;
        self.inner.evaluate(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_oracles() {
        let mut oracle = |p: &[usize]| -> Result<Evaluation, OracleError> {
            Ok(Evaluation::cost_only(p.iter().sum::<usize>() as f64))
        };
        assert_eq!(oracle.evaluate(&[1, 2, 3]).unwrap().cost, 6.0);
    }

    #[test]
    fn counting_includes_failures() {
        let inner = |p: &[usize]| -> Result<Evaluation, OracleError> {
            if p[0] == 0 {
                Err(OracleError::Failed("sim crashed".into()))
            } else {
                Ok(Evaluation::cost_only(1.0))
            }
        };
        let mut oracle = CountingOracle::new(inner);
        assert!(oracle.evaluate(&[1]).is_ok());
        assert!(oracle.evaluate(&[0]).is_err());
        assert_eq!(oracle.calls(), 2);
    }
}
