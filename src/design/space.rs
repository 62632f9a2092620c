//! Discrete parameter space.
//!
//! Each tunable parameter is a `(min, max, step)` range; a design stores
//! indices into the resulting value vectors.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Design;
use crate::error::{Result, SearchError};

/// One tunable parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            step,
        }
    }

    /// Number of legal indices: `floor((max - min) / step)`.
    pub fn len(&self) -> usize {
        if self.step.is_nan() || self.step <= 0.0 || self.max <= self.min {
            return 0;
        }
        // Small epsilon so exact multiples don't lose a value to rounding.
        ((self.max - self.min) / self.step + 1e-9).floor() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical value at `idx`.
    pub fn value(&self, idx: usize) -> f64 {
        self.min + idx as f64 * self.step
    }
}

/// Ordered set of tunable parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    params: Vec<ParamSpec>,
}

impl ParamSpace {
    /// Build a space, rejecting empty parameters.
    pub fn new(params: Vec<ParamSpec>) -> Result<Self> {
        if params.is_empty() {
            return Err(SearchError::invalid("parameter space has no parameters"));
        }
        for p in &params {
            if p.is_empty() {
                return Err(SearchError::invalid(format!(
                    "parameter '{}' has no legal values (min {}, max {}, step {})",
                    p.name, p.min, p.max, p.step
                )));
            }
        }
        Ok(Self { params })
    }

    /// Index-only space: parameter `i` has `lens[i]` values `0..lens[i]`.
    pub fn from_lengths(lens: &[usize]) -> Result<Self> {
        Self::new(
            lens.iter()
                .enumerate()
                .map(|(i, &n)| ParamSpec::new(format!("p{}", i), 0.0, n as f64, 1.0))
                .collect(),
        )
    }

    pub fn dims(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Value-vector length per parameter.
    pub fn lens(&self) -> Vec<usize> {
        self.params.iter().map(ParamSpec::len).collect()
    }

    /// Number of distinct designs (saturating).
    pub fn cardinality(&self) -> usize {
        self.params
            .iter()
            .fold(1usize, |acc, p| acc.saturating_mul(p.len()))
    }

    /// Whether every index is inside its parameter's range.
    pub fn contains(&self, params: &[usize]) -> bool {
        params.len() == self.params.len()
            && params.iter().zip(&self.params).all(|(&i, p)| i < p.len())
    }

    /// Physical values of a design.
    pub fn values(&self, design: &Design) -> Vec<f64> {
        design
            .params()
            .iter()
            .zip(&self.params)
            .map(|(&i, p)| p.value(i))
            .collect()
    }

    /// Draw a uniformly random, unevaluated design.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Design {
        Design::new(
            self.params
                .iter()
                .map(|p| rng.gen_range(0..p.len()))
                .collect(),
        )
    }

    /// Draw `n` distinct random designs.
    pub fn sample_unique<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<Design>> {
        if n > self.cardinality() {
            return Err(SearchError::invalid(format!(
                "cannot draw {} distinct designs from a space of {}",
                n,
                self.cardinality()
            )));
        }
        let mut seen = HashSet::with_capacity(n);
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let d = self.sample(rng);
            if seen.insert(d.params().to_vec()) {
                out.push(d);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn spec_length_uses_floor() {
        assert_eq!(ParamSpec::new("w", 1.0, 100.0, 1.0).len(), 99);
        assert_eq!(ParamSpec::new("c", 0.1e-12, 10.0e-12, 0.1e-12).len(), 99);
        assert_eq!(ParamSpec::new("r", 0.0, 10.0, 3.0).len(), 3);
        assert_eq!(ParamSpec::new("bad", 1.0, 1.0, 1.0).len(), 0);
        assert_eq!(ParamSpec::new("bad", 0.0, 1.0, 0.0).len(), 0);
    }

    #[test]
    fn rejects_empty_parameter() {
        let err = ParamSpace::new(vec![ParamSpec::new("x", 2.0, 1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, SearchError::InvalidConfiguration { .. }));
        assert!(ParamSpace::new(vec![]).is_err());
    }

    #[test]
    fn samples_stay_in_range() {
        let space = ParamSpace::from_lengths(&[3, 5, 2]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let d = space.sample(&mut rng);
            assert!(space.contains(d.params()), "{:?}", d.params());
        }
        assert_eq!(space.cardinality(), 30);
        assert_eq!(space.lens(), vec![3, 5, 2]);
    }

    #[test]
    fn sample_unique_covers_small_space() {
        let space = ParamSpace::from_lengths(&[2, 3]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let all = space.sample_unique(6, &mut rng).unwrap();
        let set: HashSet<_> = all.iter().map(|d| d.params().to_vec()).collect();
        assert_eq!(set.len(), 6);
        assert!(space.sample_unique(7, &mut rng).is_err());
    }

    #[test]
    fn values_map_indices() {
        let space = ParamSpace::new(vec![
            ParamSpec::new("mul", 1.0, 10.0, 1.0),
            ParamSpec::new("res", 100.0, 1000.0, 100.0),
        ])
        .unwrap();
        let d = Design::new(vec![2, 3]);
        assert_eq!(space.values(&d), vec![3.0, 400.0]);
    }
}
