//! Per-round search log for offline analysis.

use serde::{Deserialize, Serialize};

use crate::design::{Design, DesignPool};
use crate::neural::training::TrainingReport;

/// Sorted pool at one point of the search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub designs: Vec<Vec<usize>>,
    pub costs: Vec<f64>,
}

impl PoolSnapshot {
    pub fn of(pool: &DesignPool) -> Self {
        let sorted = pool.sorted();
        Self {
            designs: sorted.iter().map(|d| d.params().to_vec()).collect(),
            costs: sorted.iter().filter_map(Design::cost).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.designs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }
}

/// Condensed [`TrainingReport`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub train_pairs: usize,
    pub valid_pairs: usize,
    pub steps: usize,
    pub final_loss: Option<f32>,
    pub train_acc: Option<f32>,
    pub valid_acc: Option<f32>,
}

impl From<&TrainingReport> for TrainingSummary {
    fn from(report: &TrainingReport) -> Self {
        Self {
            train_pairs: report.train_pairs,
            valid_pairs: report.valid_pairs,
            steps: report.steps,
            final_loss: report.last().map(|e| e.avg_loss),
            train_acc: report.last().map(|e| e.train_acc),
            valid_acc: report.valid_acc(),
        }
    }
}

/// Candidate accounting for one FILTER_AND_CONFIRM + GROW_POOL pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStats {
    /// Generator draws.
    pub tried: usize,
    /// Offspring or samples produced.
    pub candidates: usize,
    /// Skipped because already in the pool or the promising buffer.
    pub duplicates: usize,
    /// Draws that produced no offspring.
    pub identity: usize,
    pub promising: usize,
    /// Promising designs sent to the oracle.
    pub evaluated: usize,
    /// Evaluated designs strictly cheaper than the reference.
    pub confirmed_better: usize,
}

/// How the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// Too few promising candidates to spend oracle calls on.
    Converged { promising: usize, threshold: f64 },
    /// `max_rounds` retraining rounds done.
    RoundBudget { rounds: usize },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Converged {
                promising,
                threshold,
            } => write!(
                f,
                "converged ({} promising, needed more than {})",
                promising, threshold
            ),
            StopReason::RoundBudget { rounds } => write!(f, "round budget ({} rounds)", rounds),
        }
    }
}

/// One retraining round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    /// Pool the comparator was trained on.
    pub snapshot: PoolSnapshot,
    pub reference: Vec<usize>,
    pub reference_cost: f64,
    pub training: TrainingSummary,
    pub stats: RoundStats,
}

/// Everything the search did, round by round.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Logbook {
    pub rounds: Vec<RoundRecord>,
    /// Pool when the loop stopped.
    pub final_snapshot: Option<PoolSnapshot>,
    pub stop: Option<StopReason>,
    /// Full cost surface, when the oracle is a table.
    pub cost_surface: Option<Vec<f64>>,
}

impl Logbook {
    /// Oracle calls spent after bootstrapping.
    pub fn evaluated(&self) -> usize {
        self.rounds.iter().map(|r| r.stats.evaluated).sum()
    }

    /// Best cost per round, from each round's training snapshot.
    pub fn best_costs(&self) -> Vec<f64> {
        self.rounds
            .iter()
            .filter_map(|r| r.snapshot.costs.first().copied())
            .collect()
    }
}
