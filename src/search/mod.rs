//! Active-learning search loop.
//!
//! `INIT -> (RETRAIN -> FILTER_AND_CONFIRM -> GROW_POOL)* -> DONE`
//!
//! The pool and the trained comparator are owned here and only change at
//! phase boundaries. Oracle calls happen in two places: bootstrapping the
//! pool and confirming promising candidates. Every confirmed design is
//! appended right after its evaluation, so an oracle failure leaves the
//! pool consistent.

pub mod logbook;

use std::collections::HashSet;

use burn::tensor::backend::AutodiffBackend;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace};

use crate::config::{CandidateSource, SearchConfig};
use crate::design::pool::select_best;
use crate::design::{Design, DesignPool, ParamSpace};
use crate::error::{Result, SearchError};
use crate::evolve::{Bounds, OffspringGenerator, Operator, SelectionPolicy, Tournament};
use crate::neural::checkpoint::{Artifact, CheckpointDir, SavedState};
use crate::neural::data::normalize::Normalizer;
use crate::neural::inference::{Comparator, PairJudge};
use crate::neural::model::comparator::{PairwiseComparator, FIRST_NOT_WORSE, FIRST_WORSE};
use crate::neural::retrain;
use crate::neural::training::TrainingReport;
use crate::oracle::{CountingOracle, Oracle};

pub use logbook::{Logbook, PoolSnapshot, RoundRecord, RoundStats, StopReason, TrainingSummary};

/// Loop state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Phase {
    Init,
    Retrain,
    FilterAndConfirm,
    GrowPool,
    Done(StopReason),
}

/// Result of a finished search.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Lowest-cost design found, with its metrics.
    pub best: Design,
    pub stop: StopReason,
    /// Completed retraining rounds.
    pub rounds: usize,
    /// Oracle calls, bootstrap included.
    pub oracle_calls: usize,
    pub pool: DesignPool,
    pub logbook: Logbook,
}

/// Surrogate-filtered evolutionary search.
pub struct ActiveSearch<B: AutodiffBackend, O, S = Tournament> {
    config: SearchConfig,
    space: ParamSpace,
    oracle: CountingOracle<O>,
    generator: OffspringGenerator<S>,
    pool: DesignPool,
    phase: Phase,
    round: usize,
    rng: ChaCha8Rng,
    device: B::Device,
    /// Last trained weights; reused on warm start and saved in checkpoints.
    model: Option<PairwiseComparator<B>>,
    normalizer: Option<Normalizer>,
    judge: Option<Comparator<B::InnerBackend>>,
    reference: Option<Design>,
    promising: Vec<Design>,
    current: Option<RoundRecord>,
    logbook: Logbook,
    checkpoint: Option<CheckpointDir>,
}

impl<B: AutodiffBackend, O: Oracle> ActiveSearch<B, O, Tournament> {
    /// Search with tournament parent selection.
    pub fn new(config: SearchConfig, space: ParamSpace, oracle: O, device: B::Device) -> Result<Self> {
        let policy = Tournament::new(config.genetic.tournament_size);
        Self::with_policy(config, space, oracle, policy, device)
    }
}

impl<B: AutodiffBackend, O: Oracle, S: SelectionPolicy> ActiveSearch<B, O, S> {
    pub fn with_policy(
        config: SearchConfig,
        space: ParamSpace,
        oracle: O,
        policy: S,
        device: B::Device,
    ) -> Result<Self> {
        config.validate(&space)?;
        let generator =
            OffspringGenerator::new(config.genetic.clone(), Bounds::from_space(&space), policy)?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            space,
            oracle: CountingOracle::new(oracle),
            generator,
            pool: DesignPool::new(),
            phase: Phase::Init,
            round: 0,
            rng,
            device,
            model: None,
            normalizer: None,
            judge: None,
            reference: None,
            promising: Vec::new(),
            current: None,
            logbook: Logbook::default(),
            checkpoint: None,
        })
    }

    /// Persist pool, model and logbook under `dir`; reuse its initial pool.
    pub fn with_checkpoint(mut self, dir: CheckpointDir) -> Self {
        self.checkpoint = Some(dir);
        self
    }

    /// Start from an already evaluated pool instead of bootstrapping.
    pub fn with_pool(mut self, pool: DesignPool) -> Result<Self> {
        self.check_pool(&pool)?;
        self.pool = pool;
        Ok(self)
    }

    /// Continue from a saved checkpoint: pool, weights, normalizer, round.
    pub fn resume(mut self, state: SavedState<B>) -> Result<Self> {
        self.check_pool(&state.pool)?;
        info!(
            round = state.meta.round,
            pool = state.pool.len(),
            "resuming from checkpoint"
        );
        self.pool = state.pool;
        self.round = state.meta.round;
        self.normalizer = Some(state.meta.normalizer);
        self.model = Some(state.model);
        Ok(self)
    }

    /// Attach the oracle's full cost surface to the logbook.
    pub fn with_cost_surface(mut self, surface: Vec<f64>) -> Self {
        self.logbook.cost_surface = Some(surface);
        self
    }

    fn check_pool(&self, pool: &DesignPool) -> Result<()> {
        if let Some(d) = pool.iter().find(|d| !self.space.contains(d.params())) {
            return Err(SearchError::invalid(format!(
                "pool design {:?} is outside the parameter space",
                d.params()
            )));
        }
        if pool.len() <= self.config.k_top {
            return Err(SearchError::invalid(format!(
                "pool of {} designs is too small for k_top {}",
                pool.len(),
                self.config.k_top
            )));
        }
        Ok(())
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pool(&self) -> &DesignPool {
        &self.pool
    }

    /// Completed retraining rounds.
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn oracle_calls(&self) -> usize {
        self.oracle.calls()
    }

    pub fn logbook(&self) -> &Logbook {
        &self.logbook
    }

    /// Current reference design, set by each retrain.
    pub fn reference(&self) -> Option<&Design> {
        self.reference.as_ref()
    }

    /// Current trained comparator.
    pub fn judge(&self) -> Option<&Comparator<B::InnerBackend>> {
        self.judge.as_ref()
    }

    fn evaluate(&mut self, mut design: Design) -> Result<Design> {
        let evaluation = self.oracle.evaluate(design.params())?;
        design.apply(evaluation);
        Ok(design)
    }

    /// INIT: fill the pool with `n_init` distinct evaluated designs.
    ///
    /// Skipped when the pool was supplied. A cached initial pool in the
    /// checkpoint directory is reused without oracle calls.
    pub fn initialize(&mut self) -> Result<()> {
        if !self.pool.is_empty() {
            info!(pool = self.pool.len(), "starting from supplied pool");
            return Ok(());
        }
        if let Some(dir) = &self.checkpoint {
            if let Some(cached) = dir.load_pool(Artifact::InitPool)? {
                self.check_pool(&cached)?;
                info!(pool = cached.len(), "reusing cached initial pool");
                self.pool = cached;
                return Ok(());
            }
        }

        let designs = self.space.sample_unique(self.config.n_init, &mut self.rng)?;
        for design in designs {
            let design = self.evaluate(design)?;
            self.pool.push(design)?;
        }
        info!(
            pool = self.pool.len(),
            calls = self.oracle.calls(),
            "initial pool evaluated"
        );
        if let Some(dir) = &self.checkpoint {
            dir.save_pool(Artifact::InitPool, &self.pool)?;
        }
        Ok(())
    }

    /// RETRAIN: pick the reference design and train the comparator on the
    /// current pool.
    pub fn retrain(&mut self) -> Result<TrainingReport> {
        let reference = self
            .pool
            .ranked(self.config.ref_dsn_idx)
            .ok_or_else(|| SearchError::invalid("cannot retrain on an empty pool"))?;
        let warm = if self.config.warm_start {
            self.model.take()
        } else {
            None
        };

        let retrained = retrain::<B, _>(
            self.pool.designs(),
            self.config.k_top,
            &self.config.comparator,
            &self.config.training,
            warm,
            &mut self.rng,
            &self.device,
        )?;
        let report = retrained.report.clone();
        info!(
            round = self.round,
            pool = self.pool.len(),
            reference = %reference,
            train_pairs = report.train_pairs,
            valid_acc = report.valid_acc().unwrap_or(f32::NAN),
            "comparator retrained"
        );

        self.judge = Some(retrained.comparator(&self.device));
        self.normalizer = Some(retrained.normalizer);
        self.model = Some(retrained.model);
        self.current = Some(RoundRecord {
            round: self.round,
            snapshot: PoolSnapshot::of(&self.pool),
            reference: reference.params().to_vec(),
            reference_cost: reference.cost().unwrap_or(f64::NAN),
            training: TrainingSummary::from(&report),
            stats: RoundStats::default(),
        });
        self.reference = Some(reference);
        Ok(report)
    }

    /// FILTER_AND_CONFIRM: draw candidates until `m_samples` of them beat
    /// `reference` in the judge's eyes or `max_iter` draws are spent.
    ///
    /// Candidates already in the pool or already accepted are skipped. The
    /// candidate takes a random operand slot in every query.
    pub fn filter_candidates<J: PairJudge + ?Sized>(
        &mut self,
        judge: &J,
        reference: &Design,
    ) -> Result<(Vec<Design>, RoundStats)> {
        let mut stats = RoundStats::default();
        let mut promising: Vec<Design> = Vec::new();
        let mut accepted: HashSet<Vec<usize>> = HashSet::new();

        let parents: Vec<Design> = match (self.config.source, self.config.survivors) {
            (CandidateSource::Uniform, _) => Vec::new(),
            (CandidateSource::Genetic, Some(n)) => select_best(self.pool.designs().to_vec(), n),
            (CandidateSource::Genetic, None) => self.pool.designs().to_vec(),
        };

        while stats.tried < self.config.max_iter && promising.len() < self.config.m_samples {
            stats.tried += 1;
            let candidates = match self.config.source {
                CandidateSource::Uniform => vec![self.space.sample(&mut self.rng)],
                CandidateSource::Genetic => {
                    let offspring = self.generator.generate(&parents, &mut self.rng)?;
                    if offspring.operator == Operator::Identity {
                        stats.identity += 1;
                        trace!(draw = stats.tried, "identity draw, no offspring");
                    }
                    offspring.designs
                }
            };

            for candidate in candidates {
                stats.candidates += 1;
                if self.pool.contains(candidate.params()) || accepted.contains(candidate.params()) {
                    stats.duplicates += 1;
                    trace!(params = ?candidate.params(), "duplicate candidate");
                    continue;
                }
                let better = if self.rng.gen_bool(0.5) {
                    judge.classify(candidate.params(), reference.params()) == FIRST_NOT_WORSE
                } else {
                    judge.classify(reference.params(), candidate.params()) == FIRST_WORSE
                };
                if better {
                    accepted.insert(candidate.params().to_vec());
                    promising.push(candidate);
                    if promising.len() >= self.config.m_samples {
                        break;
                    }
                }
            }
        }

        stats.promising = promising.len();
        info!(
            round = self.round,
            tried = stats.tried,
            duplicates = stats.duplicates,
            identity = stats.identity,
            promising = stats.promising,
            "candidates filtered"
        );
        Ok((promising, stats))
    }

    /// GROW_POOL: evaluate every promising design and append it.
    /// Returns how many came out strictly cheaper than `reference_cost`.
    pub fn grow_pool(&mut self, promising: Vec<Design>, reference_cost: f64) -> Result<usize> {
        let mut better = 0;
        for candidate in promising {
            let design = self.evaluate(candidate)?;
            let cost = design.cost().unwrap_or(f64::INFINITY);
            if cost < reference_cost {
                better += 1;
            }
            debug!(params = ?design.params(), cost, reference_cost, "candidate confirmed");
            self.pool.push(design)?;
        }
        Ok(better)
    }

    /// Run the current phase and move to the next one.
    pub fn step(&mut self) -> Result<Phase> {
        let next = match self.phase {
            Phase::Init => {
                self.initialize()?;
                Phase::Retrain
            }
            Phase::Retrain => {
                if self.round >= self.config.max_rounds {
                    self.finish(StopReason::RoundBudget { rounds: self.round })?
                } else {
                    self.retrain()?;
                    Phase::FilterAndConfirm
                }
            }
            Phase::FilterAndConfirm => {
                let (judge, reference) = match (self.judge.take(), self.reference.clone()) {
                    (Some(judge), Some(reference)) => (judge, reference),
                    _ => return Err(SearchError::invalid("filtering before the first retrain")),
                };
                let result = self.filter_candidates(&judge, &reference);
                self.judge = Some(judge);
                let (promising, stats) = result?;
                if let Some(record) = self.current.as_mut() {
                    record.stats = stats;
                }
                self.promising = promising;
                Phase::GrowPool
            }
            Phase::GrowPool => {
                let threshold = self.config.admission_threshold();
                let promising = std::mem::take(&mut self.promising);
                if (promising.len() as f64) > threshold {
                    let reference_cost = self
                        .reference
                        .as_ref()
                        .and_then(Design::cost)
                        .unwrap_or(f64::INFINITY);
                    let evaluated = promising.len();
                    let better = self.grow_pool(promising, reference_cost)?;
                    info!(
                        round = self.round,
                        evaluated,
                        better,
                        pool = self.pool.len(),
                        "pool grown"
                    );
                    if let Some(mut record) = self.current.take() {
                        record.stats.evaluated = evaluated;
                        record.stats.confirmed_better = better;
                        self.logbook.rounds.push(record);
                    }
                    self.round += 1;
                    self.save_checkpoint()?;
                    Phase::Retrain
                } else {
                    info!(
                        round = self.round,
                        promising = promising.len(),
                        threshold,
                        "too few promising candidates, stopping"
                    );
                    self.finish(StopReason::Converged {
                        promising: promising.len(),
                        threshold,
                    })?
                }
            }
            Phase::Done(reason) => Phase::Done(reason),
        };
        self.phase = next;
        Ok(next)
    }

    fn finish(&mut self, reason: StopReason) -> Result<Phase> {
        if let Some(record) = self.current.take() {
            self.logbook.rounds.push(record);
        }
        self.logbook.final_snapshot = Some(PoolSnapshot::of(&self.pool));
        self.logbook.stop = Some(reason);
        if let Some(dir) = &self.checkpoint {
            dir.save_json(Artifact::Logbook, &self.logbook)?;
        }
        self.save_checkpoint()?;
        info!(%reason, rounds = self.round, calls = self.oracle.calls(), "search done");
        Ok(Phase::Done(reason))
    }

    fn save_checkpoint(&self) -> Result<()> {
        match (&self.checkpoint, &self.model, &self.normalizer) {
            (Some(dir), Some(model), Some(normalizer)) => {
                dir.save_state(model, normalizer, &self.pool, self.round)
            }
            (Some(dir), _, _) => dir.save_pool(Artifact::Pool, &self.pool).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Step until DONE and report the best design.
    pub fn run(mut self) -> Result<SearchOutcome> {
        let stop = loop {
            if let Phase::Done(reason) = self.step()? {
                break reason;
            }
        };
        let best = self
            .pool
            .best()
            .cloned()
            .ok_or_else(|| SearchError::invalid("search finished with an empty pool"))?;
        Ok(SearchOutcome {
            best,
            stop,
            rounds: self.round,
            oracle_calls: self.oracle.calls(),
            pool: self.pool,
            logbook: self.logbook,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::inference::ExactJudge;
    use crate::oracle::TableOracle;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray>;

    fn bowl(p: &[usize]) -> f64 {
        let a = p[0] as f64 - 7.0;
        let b = p[1] as f64 - 3.0;
        a * a + b * b
    }

    fn small_config() -> SearchConfig {
        SearchConfig::new()
            .with_n_init(30)
            .with_k_top(5)
            .with_ref_dsn_idx(5)
            .with_m_samples(8)
            .with_max_iter(200)
            .with_max_rounds(3)
            .with_training(
                crate::neural::training::TrainingConfig::new()
                    .with_epochs(5)
                    .with_batch_size(32),
            )
    }

    fn search(config: SearchConfig) -> ActiveSearch<B, TableOracle> {
        let space = ParamSpace::from_lengths(&[12, 12]).unwrap();
        let oracle = TableOracle::from_fn(vec![12, 12], bowl).unwrap();
        ActiveSearch::new(config, space, oracle, Default::default()).unwrap()
    }

    #[test]
    fn init_evaluates_distinct_designs() {
        let mut s = search(small_config());
        assert_eq!(s.step().unwrap(), Phase::Retrain);
        assert_eq!(s.pool().len(), 30);
        assert_eq!(s.oracle_calls(), 30);
        assert!(s.pool().iter().all(|d| d.cost() == Some(bowl(d.params()))));
    }

    #[test]
    fn filter_never_accepts_duplicates() {
        let mut s = search(small_config().with_m_samples(40).with_max_iter(500));
        s.initialize().unwrap();
        let reference = s.pool().ranked(5).unwrap();
        let judge = ExactJudge::new(bowl);

        let (promising, stats) = s.filter_candidates(&judge, &reference).unwrap();
        let unique: HashSet<&[usize]> = promising.iter().map(|d| d.params()).collect();
        assert_eq!(unique.len(), promising.len());
        assert!(promising.iter().all(|d| !s.pool().contains(d.params())));
        assert!(promising.iter().all(|d| bowl(d.params()) <= reference.cost().unwrap()));
        assert_eq!(stats.promising, promising.len());
        assert!(stats.tried <= 500);
        // Filtering never calls the oracle.
        assert_eq!(s.oracle_calls(), 30);

        // Same seed, same pool: the second pass accepts exactly the same designs.
        let mut again = search(small_config().with_m_samples(40).with_max_iter(500));
        again.initialize().unwrap();
        assert_eq!(again.pool().designs(), s.pool().designs());
        let (repeat, repeat_stats) = again.filter_candidates(&judge, &reference).unwrap();
        assert_eq!(repeat, promising);
        assert_eq!(repeat_stats, stats);
        let unique: HashSet<&[usize]> = repeat.iter().map(|d| d.params()).collect();
        assert_eq!(unique.len(), repeat.len());
        assert!(repeat.iter().all(|d| !again.pool().contains(d.params())));
    }

    #[test]
    fn identity_draws_are_counted() {
        let genetic = crate::evolve::GeneticConfig::new().with_cxpb(0.0).with_mutpb(0.0);
        let mut s = search(small_config().with_genetic(genetic).with_max_iter(25));
        s.initialize().unwrap();
        let reference = s.pool().ranked(5).unwrap();
        let (promising, stats) = s
            .filter_candidates(&ExactJudge::new(bowl), &reference)
            .unwrap();
        assert!(promising.is_empty());
        assert_eq!(stats.tried, 25);
        assert_eq!(stats.identity, 25);
        assert_eq!(stats.candidates, 0);
    }

    #[test]
    fn grow_pool_appends_evaluated() {
        let mut s = search(small_config());
        s.initialize().unwrap();
        let fresh: Vec<Design> = (0..12)
            .flat_map(|a| (0..12).map(move |b| vec![a, b]))
            .filter(|p| !s.pool().contains(p))
            .take(3)
            .map(Design::new)
            .collect();
        let better = s.grow_pool(fresh, f64::INFINITY).unwrap();
        assert_eq!(better, 3);
        assert_eq!(s.pool().len(), 33);
        assert_eq!(s.oracle_calls(), 33);
    }

    #[test]
    fn oracle_failure_aborts_and_keeps_pool() {
        let space = ParamSpace::from_lengths(&[12, 12]).unwrap();
        let mut calls = 0;
        let failing = move |p: &[usize]| {
            calls += 1;
            if calls > 30 {
                Err(crate::error::OracleError::Failed("simulator crashed".into()))
            } else {
                Ok(crate::oracle::Evaluation::cost_only(bowl(p)))
            }
        };
        let mut s: ActiveSearch<B, _> =
            ActiveSearch::new(small_config(), space, failing, Default::default()).unwrap();
        s.initialize().unwrap();
        let err = s
            .grow_pool(vec![Design::new(vec![11, 11]), Design::new(vec![0, 0])], 0.0)
            .unwrap_err();
        assert!(matches!(err, SearchError::Oracle(_)));
        assert_eq!(s.pool().len(), 30);
    }

    #[test]
    fn stops_on_round_budget() {
        let mut s = search(small_config().with_max_rounds(0));
        assert_eq!(s.step().unwrap(), Phase::Retrain);
        let phase = s.step().unwrap();
        assert_eq!(phase, Phase::Done(StopReason::RoundBudget { rounds: 0 }));
        assert_eq!(s.step().unwrap(), phase);
        assert!(s.logbook().final_snapshot.is_some());
    }

    #[test]
    fn converges_on_table_minimum() {
        let config = small_config().with_max_rounds(40).with_seed(1);
        let oracle = TableOracle::from_fn(vec![12, 12], bowl).unwrap();
        let (min_params, min_cost) = oracle.minimum();

        let outcome = search(config).run().unwrap();
        assert!(
            matches!(outcome.stop, StopReason::Converged { .. }),
            "stopped by {}",
            outcome.stop
        );
        assert!(outcome.rounds < 40);
        assert_eq!(outcome.best.params(), min_params.as_slice());
        assert_eq!(outcome.best.cost(), Some(min_cost));
        assert_eq!(outcome.oracle_calls, outcome.pool.len());
    }

    #[test]
    fn rejects_invalid_config() {
        let space = ParamSpace::from_lengths(&[12, 12]).unwrap();
        let oracle = TableOracle::from_fn(vec![12, 12], bowl).unwrap();
        let result: Result<ActiveSearch<B, _>> = ActiveSearch::new(
            small_config().with_k_top(30),
            space,
            oracle,
            Default::default(),
        );
        assert!(matches!(result, Err(SearchError::InvalidConfiguration { .. })));
    }
}
