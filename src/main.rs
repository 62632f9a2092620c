#![recursion_limit = "256"]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::diagnose::DiagnoseArgs;
use cli::search::SearchArgs;

#[derive(Parser)]
#[command(
    name = "pairsearch",
    version,
    about = "Surrogate-filtered evolutionary search over discrete design spaces"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the active-learning search against a sweep table
    Search(SearchArgs),
    /// Report comparator quality for a saved checkpoint
    Diagnose(DiagnoseArgs),
    /// Write the default search configuration
    Config {
        /// Output JSON file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Search(args) => cli::search::cmd_search(args),
        Command::Diagnose(args) => cli::diagnose::cmd_diagnose(args),
        Command::Config { out } => cmd_config(out),
    }
}

// --- pairsearch config ---

fn cmd_config(out: Option<PathBuf>) {
    use burn::config::Config;

    let config = pairsearch::SearchConfig::new();
    match out {
        Some(path) => {
            if let Err(e) = config.save(&path) {
                cli::fail(format!("cannot write '{}': {}", path.display(), e));
            }
            eprintln!("Wrote default configuration to {}", path.display());
        }
        None => println!("{}", config),
    }
}
