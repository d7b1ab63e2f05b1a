// ============================================================
// Layer 6 — Run Directory & Training Checkpoint
// ============================================================
// Every Trainer gets its own run directory:
//
//   out_dir/dump/
//     run_0/
//       training_checkpoint.pth   ← best epoch so far (overwritten)
//       trainer_config.json       ← config the run was started with
//       metrics.csv               ← one row per epoch
//       evaluation/
//     run_1/
//     ...
//
// The checkpoint is one bincode blob. Model and optimizer state
// are embedded as Burn NamedMpk byte payloads, so the blob does
// not depend on the backend the run was trained on.
//
// Writes go to a temporary file that is renamed over the old
// checkpoint, so a crash mid-save never leaves a torn file.

use anyhow::{Context, Result};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Record, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainerConfig;
use crate::ml::{metrics::MetricMap, optim::OptimizerKind};

pub const CHECKPOINT_FILE: &str = "training_checkpoint.pth";
pub const CONFIG_FILE: &str = "trainer_config.json";
pub const EVALUATION_DIR: &str = "evaluation";
const DUMP_DIR: &str = "dump";
const RUN_PREFIX: &str = "run_";

// ─── Run directory ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RunDirectory {
    root:  PathBuf,
    index: usize,
}

impl RunDirectory {
    /// Claim the next free `run_<n>` under `out_dir/dump`.
    ///
    /// The highest existing index is scanned first; the claim itself
    /// is a `create_dir`, which fails if another process got there
    /// first, in which case the next index is tried.
    pub fn allocate(out_dir: &Path) -> Result<Self> {
        let dump = out_dir.join(DUMP_DIR);
        fs::create_dir_all(&dump)
            .with_context(|| format!("Cannot create '{}'", dump.display()))?;

        let mut index = highest_run_index(&dump)?.map_or(0, |n| n + 1);
        loop {
            let root = dump.join(format!("{RUN_PREFIX}{index}"));
            match fs::create_dir(&root) {
                Ok(()) => {
                    fs::create_dir_all(root.join(EVALUATION_DIR))
                        .with_context(|| format!("Cannot create '{}'", root.display()))?;
                    tracing::info!("Run directory: '{}'", root.display());
                    return Ok(Self { root, index });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => index += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("Cannot create '{}'", root.display()))
                }
            }
        }
    }

    /// Reopen an existing run directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        anyhow::ensure!(root.is_dir(), "Run directory '{}' does not exist", root.display());
        let index = root
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_run_index)
            .unwrap_or(0);
        Ok(Self { root, index })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join(CHECKPOINT_FILE)
    }

    /// Save the trainer configuration to `trainer_config.json`.
    pub fn save_config(&self, cfg: &TrainerConfig) -> Result<()> {
        let path = self.root.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved trainer config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainerConfig> {
        load_config(&self.root)
    }
}

/// Read `trainer_config.json` from a run directory.
pub fn load_config(run_dir: &Path) -> Result<TrainerConfig> {
    let path = run_dir.join(CONFIG_FILE);
    let json = fs::read_to_string(&path).with_context(|| {
        format!("Cannot read config from '{}'. Was this directory created by 'train'?", path.display())
    })?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed trainer config '{}'", path.display()))
}

fn parse_run_index(name: &str) -> Option<usize> {
    name.strip_prefix(RUN_PREFIX)?.parse().ok()
}

fn highest_run_index(dump: &Path) -> Result<Option<usize>> {
    let mut highest = None;
    for entry in fs::read_dir(dump).with_context(|| format!("Cannot list '{}'", dump.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(n) = entry.file_name().to_str().and_then(parse_run_index) {
            highest = highest.max(Some(n));
        }
    }
    Ok(highest)
}

// ─── Checkpoint ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingCheckpoint {
    /// 1-based epoch the checkpoint was taken after
    pub epoch:           usize,
    pub optimizer:       OptimizerKind,
    pub model_state:     Vec<u8>,
    pub optimizer_state: Vec<u8>,
    pub train_loss:      f64,
    pub val_metrics:     MetricMap,
    pub test_metrics:    Option<MetricMap>,
}

impl TrainingCheckpoint {
    /// Write (or overwrite) the checkpoint at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self).context("Cannot serialise checkpoint")?;

        let tmp = path.with_extension("pth.tmp");
        fs::write(&tmp, bytes)
            .with_context(|| format!("Cannot write checkpoint to '{}'", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Cannot move checkpoint into '{}'", path.display()))?;

        tracing::info!(
            epoch = self.epoch,
            train_loss = self.train_loss,
            "Saved checkpoint to '{}'",
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| {
            format!("Cannot read checkpoint '{}'. Have you run 'train' first?", path.display())
        })?;
        bincode::deserialize(&bytes)
            .with_context(|| format!("Malformed checkpoint '{}'", path.display()))
    }
}

/// Serialise a Burn record (model or optimizer state) to bytes.
pub fn record_to_bytes<B: Backend, R: Record<B>>(record: R) -> Result<Vec<u8>> {
    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::record(&recorder, record, ())
        .map_err(|e| anyhow::anyhow!("Cannot serialise record: {e}"))
}

/// Rebuild a Burn record from bytes written by `record_to_bytes`.
pub fn bytes_to_record<B: Backend, R: Record<B>>(bytes: Vec<u8>, device: &B::Device) -> Result<R> {
    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::load(&recorder, bytes, device)
        .map_err(|e| anyhow::anyhow!("Cannot restore record (architecture mismatch?): {e}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn checkpoint(epoch: usize, f1: f64) -> TrainingCheckpoint {
        TrainingCheckpoint {
            epoch,
            optimizer:       OptimizerKind::Nadam,
            model_state:     vec![1, 2, 3],
            optimizer_state: vec![],
            train_loss:      0.42,
            val_metrics:     MetricMap::from([("f1".to_string(), f1)]),
            test_metrics:    None,
        }
    }

    #[test]
    fn test_first_run_is_run_0_then_increments() {
        let tmp = TempDir::new().unwrap();
        let a = RunDirectory::allocate(tmp.path()).unwrap();
        let b = RunDirectory::allocate(tmp.path()).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert!(a.path().join(EVALUATION_DIR).is_dir());
        assert!(tmp.path().join("dump/run_1").is_dir());
    }

    #[test]
    fn test_allocation_continues_after_highest_index() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("dump/run_7")).unwrap();
        fs::create_dir_all(tmp.path().join("dump/run_2")).unwrap();
        fs::write(tmp.path().join("dump/notes.txt"), "x").unwrap();

        let run = RunDirectory::allocate(tmp.path()).unwrap();
        assert_eq!(run.index(), 8);
    }

    #[test]
    fn test_checkpoint_is_overwritten() {
        let tmp = TempDir::new().unwrap();
        let run = RunDirectory::allocate(tmp.path()).unwrap();

        checkpoint(1, 0.5).save(&run.checkpoint_path()).unwrap();
        checkpoint(3, 0.8).save(&run.checkpoint_path()).unwrap();

        let loaded = TrainingCheckpoint::load(&run.checkpoint_path()).unwrap();
        assert_eq!(loaded.epoch, 3);
        assert_eq!(loaded.val_metrics["f1"], 0.8);
        assert_eq!(loaded.optimizer, OptimizerKind::Nadam);

        let files: Vec<_> = fs::read_dir(run.path()).unwrap().collect();
        // checkpoint + evaluation/
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(TrainingCheckpoint::load(&tmp.path().join(CHECKPOINT_FILE)).is_err());
    }

    #[test]
    fn test_config_round_trip_through_run_dir() {
        let tmp = TempDir::new().unwrap();
        let run = RunDirectory::allocate(tmp.path()).unwrap();
        let cfg = TrainerConfig { num_classes: Some(4), ..TrainerConfig::default() };
        run.save_config(&cfg).unwrap();

        let reopened = RunDirectory::open(run.path()).unwrap();
        assert_eq!(reopened.index(), 0);
        assert_eq!(reopened.load_config().unwrap().num_classes, Some(4));
    }
}
