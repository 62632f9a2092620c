//! Checkpoint directory for the comparator and the search state.
//!
//! Model weights use burn's native record format (NamedMpk, full
//! precision). Everything else is JSON: normalization statistics and round
//! metadata, the evaluated pool, the cached initial pool, the logbook.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::design::DesignPool;
use crate::error::{Result, SearchError};
use crate::neural::data::normalize::Normalizer;
use crate::neural::model::comparator::PairwiseComparator;

/// Files kept in a checkpoint directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// Comparator weights (`.mpk`).
    Model,
    /// Normalizer, round counter and pool fingerprint.
    Meta,
    /// Full evaluated pool.
    Pool,
    /// Initial pool, reused to skip bootstrap oracle calls.
    InitPool,
    Logbook,
}

impl Artifact {
    fn stem(&self) -> &'static str {
        match self {
            Self::Model => "comparator",
            Self::Meta => "meta",
            Self::Pool => "pool",
            Self::InitPool => "init_pool",
            Self::Logbook => "logbook",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Model => "mpk",
            _ => "json",
        }
    }
}

/// State saved next to the weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Retraining rounds completed when saved.
    pub round: usize,
    pub pool_len: usize,
    /// blake3 of the serialized pool.
    pub pool_fingerprint: String,
    pub normalizer: Normalizer,
}

/// Hex blake3 digest of the pool's JSON form.
pub fn pool_fingerprint(pool: &DesignPool) -> Result<String> {
    let bytes = serde_json::to_vec(pool)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// A directory holding one search's artifacts.
#[derive(Clone, Debug)]
pub struct CheckpointDir {
    root: PathBuf,
}

impl CheckpointDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of an artifact, extension included.
    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.root
            .join(artifact.stem())
            .with_extension(artifact.extension())
    }

    pub fn exists(&self, artifact: Artifact) -> bool {
        self.path(artifact).exists()
    }

    fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| SearchError::checkpoint(&self.root, format!("mkdir: {}", e)))
    }

    /// Save comparator weights.
    pub fn save_model<B: Backend>(&self, model: &PairwiseComparator<B>) -> Result<PathBuf> {
        self.ensure()?;
        // burn appends .mpk
        let path = self.root.join(Artifact::Model.stem());
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(path.clone(), &recorder)
            .map_err(|e| SearchError::checkpoint(&path, e))?;
        Ok(self.path(Artifact::Model))
    }

    /// Load weights into `model`; `None` if no weights are stored.
    pub fn load_model<B: Backend>(
        &self,
        model: PairwiseComparator<B>,
        device: &B::Device,
    ) -> Result<Option<PairwiseComparator<B>>> {
        let full_path = self.path(Artifact::Model);
        if !full_path.exists() {
            return Ok(None);
        }
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let loaded = model
            .load_file(self.root.join(Artifact::Model.stem()), &recorder, device)
            .map_err(|e| SearchError::checkpoint(&full_path, e))?;
        Ok(Some(loaded))
    }

    /// Write any JSON artifact.
    pub fn save_json<T: Serialize + ?Sized>(&self, artifact: Artifact, value: &T) -> Result<PathBuf> {
        self.ensure()?;
        let path = self.path(artifact);
        let text = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, text).map_err(|e| SearchError::checkpoint(&path, e))?;
        Ok(path)
    }

    /// Read a JSON artifact; `None` if absent.
    pub fn load_json<T: DeserializeOwned>(&self, artifact: Artifact) -> Result<Option<T>> {
        let path = self.path(artifact);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| SearchError::checkpoint(&path, e))?;
        let value = serde_json::from_str(&text).map_err(|e| SearchError::checkpoint(&path, e))?;
        Ok(Some(value))
    }

    pub fn save_pool(&self, artifact: Artifact, pool: &DesignPool) -> Result<PathBuf> {
        self.save_json(artifact, pool)
    }

    pub fn load_pool(&self, artifact: Artifact) -> Result<Option<DesignPool>> {
        self.load_json(artifact)
    }

    /// Save weights, metadata and pool together.
    pub fn save_state<B: Backend>(
        &self,
        model: &PairwiseComparator<B>,
        normalizer: &Normalizer,
        pool: &DesignPool,
        round: usize,
    ) -> Result<()> {
        let meta = CheckpointMeta {
            round,
            pool_len: pool.len(),
            pool_fingerprint: pool_fingerprint(pool)?,
            normalizer: normalizer.clone(),
        };
        self.save_model(model)?;
        self.save_json(Artifact::Meta, &meta)?;
        self.save_pool(Artifact::Pool, pool)?;
        info!(dir = %self.root.display(), round, pool = pool.len(), "checkpoint saved");
        Ok(())
    }

    /// Restore weights, metadata and pool.
    ///
    /// `None` unless all three artifacts exist. A pool whose fingerprint
    /// differs from the recorded one is still returned, with a warning.
    pub fn load_state<B: Backend>(
        &self,
        model: PairwiseComparator<B>,
        device: &B::Device,
    ) -> Result<Option<SavedState<B>>> {
        let Some(meta) = self.load_json::<CheckpointMeta>(Artifact::Meta)? else {
            return Ok(None);
        };
        let Some(pool) = self.load_pool(Artifact::Pool)? else {
            return Ok(None);
        };
        let Some(model) = self.load_model(model, device)? else {
            return Ok(None);
        };
        let fingerprint = pool_fingerprint(&pool)?;
        if fingerprint != meta.pool_fingerprint {
            warn!(
                dir = %self.root.display(),
                expected = %meta.pool_fingerprint,
                found = %fingerprint,
                "pool does not match the one the comparator was saved with"
            );
        }
        Ok(Some(SavedState { model, meta, pool }))
    }
}

/// Everything [`CheckpointDir::load_state`] restores.
pub struct SavedState<B: Backend> {
    pub model: PairwiseComparator<B>,
    pub meta: CheckpointMeta,
    pub pool: DesignPool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::Design;
    use crate::neural::model::comparator::ComparatorConfig;
    use burn::backend::NdArray;

    type B = NdArray;

    fn pool() -> DesignPool {
        DesignPool::from_designs(vec![
            Design::evaluated(vec![1, 2], 0.5),
            Design::evaluated(vec![3, 1], 0.25),
        ])
        .unwrap()
    }

    #[test]
    fn artifact_paths() {
        let dir = CheckpointDir::new("/tmp/run");
        assert_eq!(dir.path(Artifact::Model), PathBuf::from("/tmp/run/comparator.mpk"));
        assert_eq!(dir.path(Artifact::Meta), PathBuf::from("/tmp/run/meta.json"));
        assert_eq!(dir.path(Artifact::InitPool), PathBuf::from("/tmp/run/init_pool.json"));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = pool_fingerprint(&pool()).unwrap();
        assert_eq!(a, pool_fingerprint(&pool()).unwrap());
        let mut grown = pool();
        grown.push(Design::evaluated(vec![0, 0], 1.0)).unwrap();
        assert_ne!(a, pool_fingerprint(&grown).unwrap());
    }

    #[test]
    fn missing_artifacts_load_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CheckpointDir::new(tmp.path().join("empty"));
        let device = Default::default();
        let model = ComparatorConfig::new().init::<B>(2, &device);
        assert!(dir.load_pool(Artifact::Pool).unwrap().is_none());
        assert!(dir.load_state(model, &device).unwrap().is_none());
    }

    #[test]
    fn state_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CheckpointDir::new(tmp.path());
        let device = Default::default();
        let config = ComparatorConfig::new();
        let model = config.init::<B>(2, &device);
        let normalizer = Normalizer {
            mean: vec![1.0, 2.0],
            std: vec![0.5, 0.25],
        };
        dir.save_state(&model, &normalizer, &pool(), 3).unwrap();
        assert!(dir.exists(Artifact::Model));

        let fresh = config.init::<B>(2, &device);
        let state = dir.load_state(fresh, &device).unwrap().unwrap();
        assert_eq!(state.meta.round, 3);
        assert_eq!(state.meta.normalizer, normalizer);
        assert_eq!(state.pool.len(), 2);

        let before = model.output.weight.val().into_data().to_vec::<f32>().unwrap();
        let after = state.model.output.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(before, after);
    }
}
