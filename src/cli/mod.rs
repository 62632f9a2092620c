pub mod diagnose;
pub mod search;

use std::path::Path;
use std::process;

use pairsearch::design::ParamSpace;
use pairsearch::oracle::TableOracle;
use pairsearch::SearchConfig;

/// Print an error and exit with status 1.
pub fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", msg);
    process::exit(1);
}

/// Load a sweep table and the parameter space it spans.
pub fn load_sweep(path: &Path) -> (ParamSpace, TableOracle) {
    match TableOracle::load(path) {
        Ok(loaded) => loaded,
        Err(e) => fail(format!("cannot load sweep '{}': {}", path.display(), e)),
    }
}

/// Load a config file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> SearchConfig {
    match path {
        Some(p) => SearchConfig::from_file(p).unwrap_or_else(|e| fail(e)),
        None => SearchConfig::new(),
    }
}
