// ============================================================
// Layer 4 — Tabular Dataset Loader
// ============================================================
// Reads the labeled dataset from a JSON Lines file, one row
// per line:
//
//   {"text": "Cup final tonight", "labels": [1, 0, 0]}
//   {"text": "Budget row delays stadium", "labels": [1, 1, 1]}
//
// Blank lines are skipped. A row that fails to parse is a hard
// error: silently dropping rows would shift every `idx` after
// it and break traceability of the partitions.
//
// The same module reads and writes the persisted partitions
// (rows carrying their `idx`) used by the splitter.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::sample::{IndexedSample, LabeledSample};
use crate::domain::traits::SampleSource;

/// Loads all rows of a JSON Lines dataset.
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SampleSource for JsonlSource {
    fn load_all(&self) -> Result<Vec<LabeledSample>> {
        let rows: Vec<LabeledSample> = read_jsonl(&self.path)?;
        tracing::info!("Loaded {} rows from '{}'", rows.len(), self.path.display());
        Ok(rows)
    }
}

/// Read every non-blank line of `path` as one JSON value.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open dataset file '{}'", path.display()))?;

    let mut rows = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).with_context(|| {
            format!("Malformed row at {}:{}", path.display(), line_no + 1)
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write `rows` as JSON Lines, replacing any existing file.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// File holding the rows of one persisted partition
pub const PARTITION_FILE: &str = "data.jsonl";

/// Load a persisted partition directory (e.g. `dataset/train`).
pub fn load_partition(dir: &Path) -> Result<Vec<IndexedSample>> {
    let rows: Vec<IndexedSample> = read_jsonl(&dir.join(PARTITION_FILE))
        .with_context(|| format!("Cannot load partition '{}'", dir.display()))?;
    tracing::debug!("Loaded partition '{}' ({} rows)", dir.display(), rows.len());
    Ok(rows)
}
