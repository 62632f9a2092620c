use std::path::PathBuf;

use burn::backend::NdArray;
use clap::Args;

use pairsearch::neural::checkpoint::{Artifact, CheckpointDir};
use pairsearch::neural::inference::Comparator;
use pairsearch::neural::report::{reference_report, swap_consistency};
use pairsearch::search::Logbook;

type B = NdArray;

#[derive(Args)]
pub struct DiagnoseArgs {
    /// Sweep table the checkpoint was trained on
    #[arg(long)]
    pub sweep: PathBuf,
    /// Checkpoint directory written by `search`
    #[arg(long, default_value = "pairsearch-run")]
    pub dir: PathBuf,
    /// Search configuration used for the run
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn cmd_diagnose(args: DiagnoseArgs) {
    let (space, _oracle) = super::load_sweep(&args.sweep);
    let config = super::load_config(args.config.as_deref());
    let dir = CheckpointDir::new(&args.dir);
    let device = Default::default();

    let model = config.comparator.init::<B>(space.dims(), &device);
    let state = match dir.load_state(model, &device) {
        Ok(Some(state)) => state,
        Ok(None) => super::fail(format!("no checkpoint in '{}'", args.dir.display())),
        Err(e) => super::fail(e),
    };
    let reference = match state.pool.ranked(config.ref_dsn_idx) {
        Some(r) => r,
        None => super::fail(format!(
            "pool of {} designs has no rank {}",
            state.pool.len(),
            config.ref_dsn_idx
        )),
    };

    eprintln!(
        "Checkpoint round {}, pool {} designs",
        state.meta.round,
        state.pool.len()
    );
    let samples = state.pool.sorted();
    let judge = Comparator::new(state.model, state.meta.normalizer, device);
    let report = reference_report(&judge, &reference, &samples).unwrap_or_else(|e| super::fail(e));
    eprint!("{}", report.format_report());
    eprintln!("{}", swap_consistency(&judge, reference.params(), &samples));

    match dir.load_json::<Logbook>(Artifact::Logbook) {
        Ok(Some(book)) => {
            if let Some(stop) = book.stop {
                eprintln!("stopped: {}", stop);
            }
            let best: Vec<String> = book.best_costs().iter().map(|c| format!("{:.4}", c)).collect();
            eprintln!("best cost per round: [{}]", best.join(", "));
            eprintln!("oracle calls after bootstrap: {}", book.evaluated());
        }
        Ok(None) => {}
        Err(e) => eprintln!("warning: {}", e),
    }
}
