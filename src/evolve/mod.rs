//! Genetic operator engine.
//!
//! Produces candidate designs from a population with one operator draw per
//! call: crossover (two children), mutation (one child), or nothing.
//! Offspring always stay inside the parameter bounds.

pub mod operators;
pub mod select;

use burn::config::Config;
use rand::{Rng, RngCore};

use crate::design::Design;
use crate::error::{Result, SearchError};
use operators::{polynomial_mutation, sbx_crossover};

pub use operators::Bounds;
pub use select::{RandomPick, SelectionPolicy, Tournament};

/// Variation operator settings.
#[derive(Config, Debug)]
pub struct GeneticConfig {
    /// Crossover probability per call.
    #[config(default = 0.6)]
    pub cxpb: f64,
    /// Mutation probability per call.
    #[config(default = 0.3)]
    pub mutpb: f64,
    /// Distribution index shared by crossover and mutation.
    #[config(default = 20.0)]
    pub eta: f64,
    /// Per-gene mutation probability; `None` means `1 / dims`.
    pub indpb: Option<f64>,
    /// Contestants per tournament.
    #[config(default = 3)]
    pub tournament_size: usize,
}

impl GeneticConfig {
    /// Probabilities must lie in `[0, 1]` and `cxpb + mutpb <= 1`.
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [("cxpb", self.cxpb), ("mutpb", self.mutpb)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SearchError::invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.cxpb + self.mutpb > 1.0 {
            return Err(SearchError::invalid(format!(
                "cxpb + mutpb must not exceed 1.0, got {} + {}",
                self.cxpb, self.mutpb
            )));
        }
        if let Some(p) = self.indpb {
            if !(0.0..=1.0).contains(&p) {
                return Err(SearchError::invalid(format!(
                    "indpb must be within [0, 1], got {}",
                    p
                )));
            }
        }
        if self.eta.is_nan() || self.eta < 0.0 {
            return Err(SearchError::invalid(format!(
                "eta must be non-negative, got {}",
                self.eta
            )));
        }
        Ok(())
    }
}

/// Which operator a single draw picked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Crossover,
    Mutation,
    /// Draw fell above `cxpb + mutpb`; no offspring this call.
    Identity,
}

/// Offspring of one call.
#[derive(Debug)]
pub struct Offspring {
    pub operator: Operator,
    pub designs: Vec<Design>,
}

/// Genetic operator engine bound to a parameter space.
pub struct OffspringGenerator<S = Tournament> {
    config: GeneticConfig,
    bounds: Bounds,
    policy: S,
}

impl OffspringGenerator<Tournament> {
    /// Engine with tournament selection sized by the config.
    pub fn tournament(config: GeneticConfig, bounds: Bounds) -> Result<Self> {
        let policy = Tournament::new(config.tournament_size);
        Self::new(config, bounds, policy)
    }
}

impl<S: SelectionPolicy> OffspringGenerator<S> {
    pub fn new(config: GeneticConfig, bounds: Bounds, policy: S) -> Result<Self> {
        config.validate()?;
        if bounds.dims() == 0 {
            return Err(SearchError::invalid("bounds have no parameters"));
        }
        Ok(Self {
            config,
            bounds,
            policy,
        })
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    /// Smallest population the configured operators can work with.
    pub fn min_population(&self) -> usize {
        if self.config.cxpb > 0.0 {
            2
        } else {
            1
        }
    }

    /// Draw one operator and apply it. Offspring are unevaluated.
    pub fn generate<R: RngCore>(&self, population: &[Design], rng: &mut R) -> Result<Offspring> {
        if population.len() < self.min_population() {
            return Err(SearchError::invalid(format!(
                "population of {} is too small for the selected operators (need {})",
                population.len(),
                self.min_population()
            )));
        }
        if let Some(bad) = population.iter().find(|d| d.dims() != self.bounds.dims()) {
            return Err(SearchError::invalid(format!(
                "design {:?} has {} parameters, bounds have {}",
                bad.params(),
                bad.dims(),
                self.bounds.dims()
            )));
        }

        let choice: f64 = rng.gen();
        if choice <= self.config.cxpb && self.config.cxpb > 0.0 {
            let (a, b) = self.policy.select_pair(population, rng);
            let (c1, c2) = sbx_crossover(
                population[a].params(),
                population[b].params(),
                self.config.eta,
                &self.bounds,
                rng,
            );
            Ok(Offspring {
                operator: Operator::Crossover,
                designs: vec![Design::new(c1), Design::new(c2)],
            })
        } else if choice < self.config.cxpb + self.config.mutpb {
            let p = self.policy.select(population, rng);
            let indpb = self
                .config
                .indpb
                .unwrap_or(1.0 / self.bounds.dims() as f64);
            let child = polynomial_mutation(
                population[p].params(),
                self.config.eta,
                indpb,
                &self.bounds,
                rng,
            );
            Ok(Offspring {
                operator: Operator::Mutation,
                designs: vec![Design::new(child)],
            })
        } else {
            Ok(Offspring {
                operator: Operator::Identity,
                designs: Vec::new(),
            })
        }
    }
}
