//! Search configuration.
//!
//! One JSON document configures the whole run; nested sections keep the
//! comparator, training and genetic settings next to their own modules.

use std::path::Path;

use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::design::ParamSpace;
use crate::error::{Result, SearchError};
use crate::evolve::GeneticConfig;
use crate::neural::model::comparator::ComparatorConfig;
use crate::neural::training::supervised::TrainingConfig;

/// Where FILTER_AND_CONFIRM draws its candidates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Crossover and mutation over the current population.
    Genetic,
    /// Uniform random designs.
    Uniform,
}

/// Active-learning loop settings.
#[derive(Config, Debug)]
pub struct SearchConfig {
    /// Designs evaluated to bootstrap the pool.
    #[config(default = 200)]
    pub n_init: usize,
    /// Promising candidates to collect per round.
    #[config(default = 20)]
    pub m_samples: usize,
    /// Top designs represented in every training pair.
    #[config(default = 20)]
    pub k_top: usize,
    /// Rank of the reference design in the cost-sorted pool.
    #[config(default = 20)]
    pub ref_dsn_idx: usize,
    #[config(default = 20)]
    pub max_rounds: usize,
    /// Generator draws per round.
    #[config(default = 1000)]
    pub max_iter: usize,
    /// Admit only when `promising > admission_frac * m_samples`.
    #[config(default = 0.1)]
    pub admission_frac: f64,
    /// Keep only the best `n` designs as genetic parents; `None` breeds
    /// from the whole pool.
    pub survivors: Option<usize>,
    #[config(default = "CandidateSource::Genetic")]
    pub source: CandidateSource,
    /// Keep trained weights across rounds instead of re-initializing.
    #[config(default = false)]
    pub warm_start: bool,
    #[config(default = 10)]
    pub seed: u64,
    #[config(default = "ComparatorConfig::new()")]
    pub comparator: ComparatorConfig,
    #[config(default = "TrainingConfig::new()")]
    pub training: TrainingConfig,
    #[config(default = "GeneticConfig::new()")]
    pub genetic: GeneticConfig,
}

impl SearchConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(path).map_err(|e| {
            SearchError::invalid(format!("cannot read config {}: {}", path.display(), e))
        })
    }

    /// Minimum promising count that lets a round reach the oracle
    /// (strictly greater than this).
    pub fn admission_threshold(&self) -> f64 {
        self.admission_frac * self.m_samples as f64
    }

    /// Reject settings that cannot run on `space`.
    pub fn validate(&self, space: &ParamSpace) -> Result<()> {
        let fail = |msg: String| -> Result<()> { Err(SearchError::invalid(msg)) };
        if self.n_init > space.cardinality() {
            return fail(format!(
                "n_init {} exceeds the {} designs in the space",
                self.n_init,
                space.cardinality()
            ));
        }
        if self.k_top == 0 || self.k_top >= self.n_init {
            return fail(format!(
                "k_top must be in 1..{} (n_init), got {}",
                self.n_init, self.k_top
            ));
        }
        if self.ref_dsn_idx >= self.n_init {
            return fail(format!(
                "ref_dsn_idx {} must be below n_init {}",
                self.ref_dsn_idx, self.n_init
            ));
        }
        if self.m_samples == 0 {
            return fail("m_samples must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.admission_frac) {
            return fail(format!(
                "admission_frac must be within [0, 1], got {}",
                self.admission_frac
            ));
        }
        if !(0.0..1.0).contains(&self.training.valid_frac) {
            return fail(format!(
                "valid_frac must be within [0, 1), got {}",
                self.training.valid_frac
            ));
        }
        if self.training.batch_size == 0 {
            return fail("batch_size must be positive".to_string());
        }
        if self.comparator.num_features == 0 {
            return fail("num_features must be positive".to_string());
        }
        if let Some(w) = self.comparator.compare_hidden.iter().find(|&&w| w % 2 == 1) {
            return fail(format!("compare_hidden widths must be even, got {}", w));
        }
        self.genetic.validate()?;
        if let Some(n) = self.survivors {
            let need = if self.genetic.cxpb > 0.0 { 2 } else { 1 };
            if n < need {
                return fail(format!(
                    "survivors {} is too small for the genetic operators (need {})",
                    n, need
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ParamSpace {
        ParamSpace::from_lengths(&[30, 30]).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = SearchConfig::new();
        assert_eq!(config.n_init, 200);
        assert_eq!(config.k_top, 20);
        assert_eq!(config.training.batch_size, 128);
        assert_eq!(config.genetic.cxpb, 0.6);
        assert_eq!(config.comparator.feature_hidden, vec![20]);
        assert_eq!(config.source, CandidateSource::Genetic);
        assert!(config.survivors.is_none());
        assert!(config.validate(&space()).is_ok());
        assert!((config.admission_threshold() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_settings() {
        let small = ParamSpace::from_lengths(&[5, 5]).unwrap();
        assert!(SearchConfig::new().validate(&small).is_err());

        let bad = [
            SearchConfig::new().with_k_top(200),
            SearchConfig::new().with_ref_dsn_idx(200),
            SearchConfig::new().with_m_samples(0),
            SearchConfig::new().with_admission_frac(1.5),
            SearchConfig::new().with_training(TrainingConfig::new().with_valid_frac(1.0)),
            SearchConfig::new().with_comparator(ComparatorConfig::new().with_compare_hidden(vec![3])),
            SearchConfig::new().with_genetic(GeneticConfig::new().with_cxpb(0.9).with_mutpb(0.3)),
            SearchConfig::new().with_survivors(Some(1)),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(&space()), Err(SearchError::InvalidConfiguration { .. })),
                "{}",
                config
            );
        }
    }

    #[test]
    fn file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("search.json");
        let config = SearchConfig::new()
            .with_n_init(50)
            .with_source(CandidateSource::Uniform)
            .with_survivors(Some(40));
        config.save(&path).unwrap();

        let loaded = SearchConfig::from_file(&path).unwrap();
        assert_eq!(loaded.n_init, 50);
        assert_eq!(loaded.source, CandidateSource::Uniform);
        assert_eq!(loaded.survivors, Some(40));
        assert!(SearchConfig::from_file(&tmp.path().join("missing.json")).is_err());
    }
}
