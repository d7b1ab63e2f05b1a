// ============================================================
// Layer 4 — Dataset Splitter
// ============================================================
// Shuffles the labeled rows with a fixed seed and slices them
// contiguously into train / validation / (optional) test:
//
//   shuffled: [ r7 r2 r9 r0 r4 r1 r8 r3 r6 r5 ]
//              └──── train ────┘└─ val ─┘└test┘
//
//   train_len = floor(N * train_size)
//   val_len   = floor(N * val_size)
//   test      = everything after train + val (only if requested)
//
// Fractions are not validated. If they sum above 1 the slices
// are clamped to the rows that exist, so validation and test
// come out shorter (or empty) instead of failing.
//
// Every row keeps its original position as `idx`, so a sample
// can always be traced back to the source file.
//
// Uses rand's seeded StdRng + Fisher-Yates shuffle, so the same
// seed and input always give the same partitions.

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::data::loader::{load_partition, write_jsonl, PARTITION_FILE};
use crate::domain::sample::{IndexedSample, LabeledSample};

pub const TRAIN_SPLIT: &str = "train";
pub const VALIDATION_SPLIT: &str = "validation";
pub const TEST_SPLIT: &str = "test";

/// Index file listing the splits present in a dataset directory
const DATASET_DICT_FILE: &str = "dataset_dict.json";

/// Split fractions and shuffling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub train_size: f64,
    pub val_size: f64,
    /// Only when set (and above zero) is a test partition produced
    pub test_size: Option<f64>,
    /// Fraction of rows kept after shuffling (1.0 keeps all)
    pub frac: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_size: 0.8,
            val_size: 0.1,
            test_size: Some(0.1),
            frac: 1.0,
            seed: 42,
        }
    }
}

/// The partitions produced by `split_dataset`.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplits {
    pub train: Vec<IndexedSample>,
    pub validation: Vec<IndexedSample>,
    pub test: Option<Vec<IndexedSample>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetDict {
    splits: Vec<String>,
}

/// Shuffle `rows` deterministically and cut them into partitions.
pub fn split_dataset(rows: Vec<LabeledSample>, cfg: &SplitConfig) -> DatasetSplits {
    let total = rows.len();
    let train_len = (total as f64 * cfg.train_size).floor() as usize;
    let val_len   = (total as f64 * cfg.val_size).floor() as usize;

    let mut indexed: Vec<IndexedSample> = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| IndexedSample::new(i as u64, row))
        .collect();

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    indexed.shuffle(&mut rng);

    // Sampling fraction, rounded like a row count
    let keep = ((total as f64) * cfg.frac).round() as usize;
    indexed.truncate(keep.min(total));

    // split_off clamps nothing, so clamp the cut points first
    let train_end = train_len.min(indexed.len());
    let val_end   = (train_len + val_len).min(indexed.len());

    let mut rest  = indexed.split_off(train_end);
    let train     = indexed;
    let tail      = rest.split_off(val_end - train_end);
    let validation = rest;
    let test = cfg.test_size.filter(|&t| t > 0.0).map(|_| tail);

    tracing::info!(
        "Dataset split: {} train, {} validation, {} test (of {} rows, seed {})",
        train.len(),
        validation.len(),
        test.as_ref().map_or(0, Vec::len),
        total,
        cfg.seed,
    );

    DatasetSplits { train, validation, test }
}

impl DatasetSplits {
    /// Split names present, in canonical order
    pub fn split_names(&self) -> Vec<&'static str> {
        let mut names = vec![TRAIN_SPLIT, VALIDATION_SPLIT];
        if self.test.is_some() {
            names.push(TEST_SPLIT);
        }
        names
    }

    /// Persist as `dir/<split>/data.jsonl` plus a `dataset_dict.json` index.
    pub fn save_to_disk(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create dataset dir '{}'", dir.display()))?;

        write_jsonl(&dir.join(TRAIN_SPLIT).join(PARTITION_FILE), &self.train)?;
        write_jsonl(&dir.join(VALIDATION_SPLIT).join(PARTITION_FILE), &self.validation)?;
        if let Some(test) = &self.test {
            write_jsonl(&dir.join(TEST_SPLIT).join(PARTITION_FILE), test)?;
        }

        let dict = DatasetDict {
            splits: self.split_names().into_iter().map(String::from).collect(),
        };
        fs::write(dir.join(DATASET_DICT_FILE), serde_json::to_string_pretty(&dict)?)
            .with_context(|| format!("Cannot write index in '{}'", dir.display()))?;

        tracing::info!("Saved dataset splits to '{}'", dir.display());
        Ok(())
    }

    /// Load partitions previously written by `save_to_disk`.
    pub fn load_from_disk(dir: &Path) -> Result<Self> {
        let dict_path = dir.join(DATASET_DICT_FILE);
        let dict: DatasetDict = serde_json::from_str(
            &fs::read_to_string(&dict_path)
                .with_context(|| format!("Cannot read '{}'", dict_path.display()))?,
        )?;

        let test = if dict.splits.iter().any(|s| s == TEST_SPLIT) {
            Some(load_partition(&dir.join(TEST_SPLIT))?)
        } else {
            None
        };

        Ok(Self {
            train: load_partition(&dir.join(TRAIN_SPLIT))?,
            validation: load_partition(&dir.join(VALIDATION_SPLIT))?,
            test,
        })
    }
}
