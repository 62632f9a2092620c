//! Evaluated design pool.
//!
//! Append-only collection of evaluated designs with a parameter-vector
//! index for de-duplication. Serializes as a plain sequence of
//! `(params, cost, metrics)` records.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{by_cost, Design};
use crate::error::{Result, SearchError};

/// Evaluated designs gathered so far. Every member has a cost.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Design>", into = "Vec<Design>")]
pub struct DesignPool {
    designs: Vec<Design>,
    index: HashSet<Vec<usize>>,
}

impl DesignPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool, rejecting unevaluated designs. Duplicates keep the
    /// first occurrence.
    pub fn from_designs(designs: impl IntoIterator<Item = Design>) -> Result<Self> {
        let mut pool = Self::new();
        for d in designs {
            pool.push(d)?;
        }
        Ok(pool)
    }

    /// Append an evaluated design. Returns false if it was already present.
    pub fn push(&mut self, design: Design) -> Result<bool> {
        if !design.is_evaluated() {
            return Err(SearchError::UnevaluatedDesign {
                params: design.params().to_vec(),
            });
        }
        if !self.index.insert(design.params().to_vec()) {
            return Ok(false);
        }
        self.designs.push(design);
        Ok(true)
    }

    pub fn contains(&self, params: &[usize]) -> bool {
        self.index.contains(params)
    }

    pub fn len(&self) -> usize {
        self.designs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }

    pub fn designs(&self) -> &[Design] {
        &self.designs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Design> {
        self.designs.iter()
    }

    /// Copy of the pool sorted by ascending cost.
    pub fn sorted(&self) -> Vec<Design> {
        let mut sorted = self.designs.clone();
        sorted.sort_by(by_cost);
        sorted
    }

    /// Lowest-cost design.
    pub fn best(&self) -> Option<&Design> {
        self.designs.iter().min_by(|a, b| by_cost(a, b))
    }

    /// Design at rank `idx` of the cost-sorted pool, clamped to the worst.
    pub fn ranked(&self, idx: usize) -> Option<Design> {
        let sorted = self.sorted();
        let last = sorted.len().checked_sub(1)?;
        sorted.into_iter().nth(idx.min(last))
    }

    /// Write the pool as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a pool written by [`DesignPool::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl TryFrom<Vec<Design>> for DesignPool {
    type Error = SearchError;

    fn try_from(designs: Vec<Design>) -> Result<Self> {
        Self::from_designs(designs)
    }
}

impl From<DesignPool> for Vec<Design> {
    fn from(pool: DesignPool) -> Self {
        pool.designs
    }
}

/// Keep the best `n` designs of `population` (survivor selection).
pub fn select_best(mut population: Vec<Design>, n: usize) -> Vec<Design> {
    population.sort_by(by_cost);
    population.truncate(n);
    population
}
