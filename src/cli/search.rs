use std::path::PathBuf;

use burn::backend::{Autodiff, NdArray, Wgpu};
use burn::tensor::backend::AutodiffBackend;
use clap::Args;

use pairsearch::design::ParamSpace;
use pairsearch::neural::checkpoint::CheckpointDir;
use pairsearch::oracle::TableOracle;
use pairsearch::{ActiveSearch, Result, SearchConfig, SearchOutcome};

#[derive(Args)]
pub struct SearchArgs {
    /// Sweep table (JSON) used as the oracle
    #[arg(long)]
    pub sweep: PathBuf,
    /// Search configuration (JSON; defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Checkpoint directory for pool, model, meta and logbook
    #[arg(long, default_value = "pairsearch-run")]
    pub dir: PathBuf,
    /// Resume from the model and pool saved in --dir
    #[arg(long)]
    pub load_model: bool,
    /// Override the configured seed
    #[arg(long)]
    pub seed: Option<u64>,
    /// Train on the GPU (wgpu) instead of the CPU
    #[arg(long)]
    pub gpu: bool,
}

pub fn cmd_search(args: SearchArgs) {
    let (space, oracle) = super::load_sweep(&args.sweep);
    let mut config = super::load_config(args.config.as_deref());
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let (min_params, min_cost) = oracle.minimum();

    eprintln!(
        "Searching {} designs ({} parameters): n_init {}, m_samples {}, k_top {}, max_rounds {}",
        space.cardinality(),
        space.dims(),
        config.n_init,
        config.m_samples,
        config.k_top,
        config.max_rounds,
    );
    if args.load_model {
        eprintln!("  resuming from {}", args.dir.display());
    }
    eprintln!();

    let start = std::time::Instant::now();
    let dir = CheckpointDir::new(&args.dir);
    let result = if args.gpu {
        run::<Autodiff<Wgpu>>(config, space.clone(), oracle, dir, args.load_model, Default::default())
    } else {
        run::<Autodiff<NdArray>>(config, space.clone(), oracle, dir, args.load_model, Default::default())
    };
    let outcome = result.unwrap_or_else(|e| super::fail(e));

    let elapsed = start.elapsed();
    eprintln!(
        "Done: {} ({} rounds, {} oracle calls, {:.1}s)",
        outcome.stop,
        outcome.rounds,
        outcome.oracle_calls,
        elapsed.as_secs_f64(),
    );
    eprintln!(
        "  best: {:?} cost {:.6}",
        space.values(&outcome.best),
        outcome.best.cost().unwrap_or(f64::NAN),
    );
    eprintln!("  table minimum: {:?} cost {:.6}", min_params, min_cost);
    for (name, value) in outcome.best.metrics() {
        eprintln!("    {:<10} {:.6e}", name, value);
    }
    eprintln!("  artifacts in {}", args.dir.display());
}

fn run<B: AutodiffBackend>(
    config: SearchConfig,
    space: ParamSpace,
    oracle: TableOracle,
    dir: CheckpointDir,
    resume: bool,
    device: B::Device,
) -> Result<SearchOutcome> {
    let surface = oracle.cost_surface();
    let model = config.comparator.init::<B>(space.dims(), &device);
    let saved = if resume {
        dir.load_state(model, &device)?
    } else {
        None
    };

    let mut search = ActiveSearch::<B, _>::new(config, space, oracle, device)?
        .with_checkpoint(dir)
        .with_cost_surface(surface);
    match saved {
        Some(state) => search = search.resume(state)?,
        None if resume => eprintln!("  no checkpoint found, starting fresh"),
        None => {}
    }
    search.run()
}
