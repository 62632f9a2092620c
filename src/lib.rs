//! Surrogate-filtered evolutionary search over discrete design spaces.
//!
//! An expensive oracle (a circuit simulator, or a precomputed sweep table)
//! scores designs. A pairwise neural comparator, retrained each round on
//! the evaluated pool, filters genetic offspring so the oracle only sees
//! candidates predicted to beat a reference design.

pub mod config;
pub mod design;
pub mod error;
pub mod evolve;
pub mod neural;
pub mod oracle;
pub mod search;

pub use config::{CandidateSource, SearchConfig};
pub use design::{Design, DesignPool, ParamSpace, ParamSpec};
pub use error::{OracleError, Result, SearchError};
pub use evolve::{GeneticConfig, OffspringGenerator};
pub use oracle::{CountingOracle, Evaluation, Oracle, TableOracle};
pub use search::{ActiveSearch, Phase, SearchOutcome, StopReason};
